//! The per-item pipeline and the worker pool that drives it.

pub mod processor;
pub mod worker;

pub use processor::{ItemProcessor, ProcessOutcome};
pub use worker::{ingest_queue, WorkerPool};
