//! Sequential loading of diff fragments: a FIFO queue that lets exactly
//! one entry be in flight, and a background worker that performs the
//! fetches and reports back over a channel.

mod queue;
mod worker;

pub use queue::{LoadQueue, LoadQueueEntry, LoadTask};
pub use worker::{FragmentSource, LoadError, LoadEvent, LoadWorker, RetryPolicy};
