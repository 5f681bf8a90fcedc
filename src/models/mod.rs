pub mod cell;
pub mod config;
pub mod invoice;
pub mod timesheet;
