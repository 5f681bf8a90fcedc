pub mod columns;
pub mod export;
pub mod format;
pub mod pdf;
pub mod rows;
pub mod serial_date;
pub mod sheet;
pub mod tickets;
