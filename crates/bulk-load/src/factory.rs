//! One factory trait per task role.
//!
//! Factories receive the launcher itself, so the tasks they build can report their own
//! completion back to it, which is what moves a sync forward. Building a task can't fail;
//! only [`Task::execute`](crate::Task::execute) can.

use std::{fmt, sync::Arc};

use super::{
	batch::{BatchEnvelope, SpilledRawMessagesLocalFile},
	catalog::DestinationStream,
	launcher::DestinationTaskLauncher,
	runner::Task,
};

pub trait SetupTaskFactory: Send + Sync + 'static {
	fn make(&self, launcher: Arc<DestinationTaskLauncher>) -> Box<dyn Task>;
}

pub trait SpillToDiskTaskFactory: Send + Sync + 'static {
	fn make(
		&self,
		launcher: Arc<DestinationTaskLauncher>,
		stream: Arc<DestinationStream>,
	) -> Box<dyn Task>;
}

pub trait OpenStreamTaskFactory: Send + Sync + 'static {
	fn make(
		&self,
		launcher: Arc<DestinationTaskLauncher>,
		stream: Arc<DestinationStream>,
	) -> Box<dyn Task>;
}

pub trait ProcessRecordsTaskFactory: Send + Sync + 'static {
	fn make(
		&self,
		launcher: Arc<DestinationTaskLauncher>,
		stream: Arc<DestinationStream>,
		file_envelope: BatchEnvelope<SpilledRawMessagesLocalFile>,
	) -> Box<dyn Task>;
}

pub trait ProcessBatchTaskFactory: Send + Sync + 'static {
	fn make(
		&self,
		launcher: Arc<DestinationTaskLauncher>,
		stream: Arc<DestinationStream>,
		batch_envelope: BatchEnvelope,
	) -> Box<dyn Task>;
}

pub trait CloseStreamTaskFactory: Send + Sync + 'static {
	fn make(
		&self,
		launcher: Arc<DestinationTaskLauncher>,
		stream: Arc<DestinationStream>,
	) -> Box<dyn Task>;
}

pub trait TeardownTaskFactory: Send + Sync + 'static {
	fn make(&self, launcher: Arc<DestinationTaskLauncher>) -> Box<dyn Task>;
}

/// The seven factories a launcher builds its tasks with.
#[derive(Clone)]
pub struct TaskFactories {
	pub setup: Arc<dyn SetupTaskFactory>,
	pub spill_to_disk: Arc<dyn SpillToDiskTaskFactory>,
	pub open_stream: Arc<dyn OpenStreamTaskFactory>,
	pub process_records: Arc<dyn ProcessRecordsTaskFactory>,
	pub process_batch: Arc<dyn ProcessBatchTaskFactory>,
	pub close_stream: Arc<dyn CloseStreamTaskFactory>,
	pub teardown: Arc<dyn TeardownTaskFactory>,
}

impl fmt::Debug for TaskFactories {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<TaskFactories>")
	}
}
