//! Data types exchanged between the EV charging authorization coordinator and
//! the components around it: token readers, validators, EVSE managers and the
//! reservation front-end.

pub mod types;
