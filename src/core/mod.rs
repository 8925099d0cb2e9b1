//! Core domain: canonical records, mapping, identity, and orchestration.

pub mod diagnostics;
pub mod idempotency;
pub mod logging;
pub mod mapper;
pub mod models;
pub mod normalize;
pub mod sync;

pub use diagnostics::{Diagnostics, DiagnosticsSummary};
pub use models::{CostRecord, MetricType, Sink};
pub use sync::{sync, Syncer};
