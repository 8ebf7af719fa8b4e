pub mod dispatcher;
pub mod format;
pub mod models;
pub mod senders;
