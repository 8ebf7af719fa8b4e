pub mod engine;
pub mod fetcher;
pub mod liveness;
pub mod scheduler;
