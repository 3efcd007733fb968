//! Ingestion workers.
//!
//! - Projection (schema kind -> typed records)
//! - Dispatcher (decode, stage, flush)
//! - Partition consumer and its manager (stream -> store, checkpointed)
//! - Push handler (MQTT -> store)
//! - Downtime/energy scheduler
//! - Error notifications

pub mod consumer;
pub mod dispatcher;
pub mod notifications;
pub mod projection;
pub mod push;
pub mod scheduler;

pub use consumer::{
    BatchOutcome, PartitionConsumer, PartitionManager, PartitionSettings, PipelineContext,
};
pub use dispatcher::{Dispatcher, FlushSummary, StageError, WriteSet};
pub use notifications::{ErrorContext, ErrorNotifier, NotificationConfig, Notifier};
pub use projection::Projector;
pub use push::DispatchHandler;
pub use scheduler::{AggregationJobs, Clock, DowntimeScheduler, SchedulerConfig, SystemClock};
