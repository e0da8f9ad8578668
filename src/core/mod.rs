pub mod container;
pub mod dom;
pub mod models;
pub mod schedule;
pub mod settings;
