pub mod command;
pub mod format;
