//! Job handlers and the registry that routes records to them
//!
//! ## Key Components
//!
//! - [`JobHandler`] - Trait implemented by everything that can run a job
//! - [`JobRegistry`] - Queue name -> job name -> handler mapping
//! - [`JobRecord`] - A unit of work as stored on a queue
//! - [`FailurePayload`] - What the failure log records for a failed dispatch
//!
//! ## Example
//!
//! ```rust,ignore
//! use dispatchbox::handlers::{handler_fn, JobRegistry};
//!
//! let mut registry = JobRegistry::new();
//! registry.register("mail", None, handler_fn("send_email", |args| async move {
//!     // deliver args[0]
//!     Ok(())
//! }));
//! ```

mod builtin;
mod registry;
mod traits;
mod types;

pub use builtin::{builtin, EchoHandler, FailHandler, SleepHandler, BUILTIN_HANDLERS};
pub use registry::{JobRegistry, RegistryError, MISSING_JOB_EXCEPTION};
pub use traits::{handler_fn, short_type_name, FnHandler, JobError, JobHandler};
pub use types::{FailurePayload, JobRecord, FAILED_AT_FORMAT};
