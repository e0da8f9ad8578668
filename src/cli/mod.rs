pub mod config;
pub mod once;
pub mod watch;
