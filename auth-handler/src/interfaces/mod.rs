mod clock;
mod interface;

pub use clock::{Clock, SystemClock};
pub use interface::AuthInterface;
