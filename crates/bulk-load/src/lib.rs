//!
//! # Bulk Load
//!
//! The write path orchestrator of a destination connector. It drives a bulk loading sync from
//! setup, through per-stream record ingestion and batch processing, up to stream closing and
//! teardown, while many streams progress concurrently.
//!
//! The pieces:
//! - [`DestinationTaskLauncher`] reacts to lifecycle events and decides which task runs next;
//! - [`TaskRunner`] executes queued tasks with a bounded concurrency, until stopped;
//! - [`SyncManager`] and [`StreamManager`] keep the per-stream bookkeeping: which record offsets
//!   were persisted, whether all batches were processed, whether the stream was opened;
//! - [`ExceptionHandler`] receives every task failure, classified as sync-fatal or stream-scoped;
//! - The task factories, one per role, build the actual task bodies. Default ones, driven by a
//!   [`DestinationWriter`], live on [`TaskFactories::for_writer`].
//!
//! ## Basic example
//!
//! ```
//! use sd_bulk_load::{LoadConfig, Task, TaskRunner};
//! use async_trait::async_trait;
//!
//! struct NoopTask;
//!
//! #[async_trait]
//! impl Task for NoopTask {
//! 	async fn execute(&mut self) -> Result<(), sd_bulk_load::Error> {
//! 		Ok(())
//! 	}
//! }
//!
//! #[tokio::main]
//! async fn main() {
//! 	let runner = TaskRunner::new(&LoadConfig::default().runner);
//!
//! 	runner.enqueue(NoopTask).await.unwrap();
//! 	runner.stop();
//!
//! 	runner.run().await.unwrap();
//! }
//! ```

#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

mod batch;
mod catalog;
mod config;
mod error;
mod exception;
mod factory;
mod launcher;
mod range_set;
mod runner;
mod state;
mod tasks;

pub use batch::{Batch, BatchEnvelope, BatchState, LocalFile, SpilledRawMessagesLocalFile};
pub use catalog::{DestinationCatalog, DestinationStream, StreamDescriptor};
pub use config::{LoadConfig, RunnerConfig, TeardownPolicy};
pub use error::{Error, SystemError};
pub use exception::{DefaultExceptionHandler, ExceptionHandler};
pub use factory::{
	CloseStreamTaskFactory, OpenStreamTaskFactory, ProcessBatchTaskFactory,
	ProcessRecordsTaskFactory, SetupTaskFactory, SpillToDiskTaskFactory, TaskFactories,
	TeardownTaskFactory,
};
pub use launcher::DestinationTaskLauncher;
pub use range_set::RangeSet;
pub use runner::{IntoTask, Task, TaskId, TaskRunner};
pub use state::{StreamManager, SyncManager};
pub use tasks::DestinationWriter;
