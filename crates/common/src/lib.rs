//! Types shared by every crate in the workspace: identifier newtypes and
//! the handle of a cancellable background job.

mod job;
mod types;

pub use job::JobHandle;
pub use types::{EventId, OrderId, Sku, UserId};
