pub mod config;
pub mod models;
pub mod monitor;
pub mod notifications;
pub mod schedule;
pub mod store;
