pub mod document;
pub mod process;
pub mod task;
pub mod transaction;
