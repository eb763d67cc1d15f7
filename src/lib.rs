//! linkprobe: probe URLs for reachability and record the outcome as
//! durable, resumable batches.
//!
//! The crate is split along the service's seams: [`prober`] fans batches of
//! URLs out to bounded concurrent network probes, [`store`] owns batch
//! lifecycle and persistence, [`server`] exposes the four HTTP endpoints,
//! and [`report`] renders completed batches into a paginated document.

pub mod config;
pub mod core;
pub mod logging;
pub mod prober;
pub mod report;
pub mod server;
pub mod store;

// Re-export commonly used items for convenience
pub use crate::core::error::{LinkProbeError, Result};
pub use crate::prober::{LinkResult, ProbeLinks, Prober};
pub use crate::report::ReportRenderer;
pub use crate::store::{Batch, BatchStatus, BatchStore};
