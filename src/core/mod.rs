pub mod alerts;
pub mod config;
pub mod discovery;
pub mod log_io;
pub mod merge;
pub mod model;
pub mod pattern;
pub mod scheduler;
pub mod snapshot;
pub mod tail;
pub mod worker;
