//! Alert ingestion for netmend.
//!
//! `POST /alert` accepts any JSON body and appends it as one line to a JSON
//! Lines file. Alerts are not validated here; interpreting them is the fault
//! summarizer's job. [`AlertQueue::dequeue`] pops the oldest line.

pub mod error;
pub mod http;
pub mod queue;

pub use error::QueueError;
pub use http::{create_router, QueueServer};
pub use queue::AlertQueue;
