//! Application-level composition utilities.

pub mod unit_of_work;
