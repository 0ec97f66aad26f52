pub mod config;
pub mod handlers;
pub mod humanize;
pub mod keys;
pub mod observability;
pub mod queue;
pub mod store;
pub mod worker;
