pub(crate) mod actions;
pub(crate) mod auth;
pub(crate) mod connector;
pub(crate) mod request;
pub(crate) mod reservation;
pub(crate) mod selection;
pub(crate) mod session;
pub(crate) mod transaction;
pub(crate) mod withdraw;
