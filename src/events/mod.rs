//! Change notifications for the presentation layer.
//!
//! Every mutating store operation publishes one event after it completes,
//! so a host can re-render from `page()` and `stats()` without polling.
//!
//! # Example
//!
//! ```ignore
//! let handle = store.subscribe();
//! store.create(input)?;
//!
//! for event in handle.drain() {
//!     match event {
//!         StoreEvent::Created { record } => println!("added {}", record.student_id),
//!         StoreEvent::Dropped { .. } => break,
//!         _ => {}
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::{EventBus, DEFAULT_BUFFER_SIZE};
pub use types::{DropReason, RecordSummary, StoreEvent, SubscriptionHandle, SubscriptionId};
