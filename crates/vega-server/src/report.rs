//! Scheduled reporting: data gathering, the per-tenant cycle and the tick
//! loop that decides when a cycle is due.

pub mod gather;
pub mod pipeline;
pub mod scheduler;

pub use gather::{AlertHistoryGatherer, GatheredData, ReportDataSource};
pub use pipeline::{CycleError, CycleOutcome, CycleStage, ScheduledReportPipeline};
pub use scheduler::ReportScheduler;
