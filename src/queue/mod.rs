pub mod client;

pub use client::{ClientError, QueueClient};
