pub mod collector;
pub mod cpu_tracker;
pub mod error;
pub mod history;
pub mod platform;
pub mod probe;
pub mod snapshot;
pub mod source;
