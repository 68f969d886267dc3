use std::sync::Arc;

use async_trait::async_trait;
use tracing::trace;

use super::{
	super::{
		batch::{BatchEnvelope, SpilledRawMessagesLocalFile},
		catalog::DestinationStream,
		error::Error,
		factory::{
			CloseStreamTaskFactory, OpenStreamTaskFactory, ProcessBatchTaskFactory,
			ProcessRecordsTaskFactory,
		},
		launcher::DestinationTaskLauncher,
		runner::Task,
	},
	DefaultTaskFactory, DestinationWriter,
};

pub(super) struct OpenStreamTask {
	launcher: Arc<DestinationTaskLauncher>,
	writer: Arc<dyn DestinationWriter>,
	stream: Arc<DestinationStream>,
}

#[async_trait]
impl Task for OpenStreamTask {
	async fn execute(&mut self) -> Result<(), Error> {
		self.writer.open_stream(&self.stream).await?;

		self.launcher
			.handle_stream_started(&self.stream.descriptor)
			.await
	}
}

impl OpenStreamTaskFactory for DefaultTaskFactory {
	fn make(
		&self,
		launcher: Arc<DestinationTaskLauncher>,
		stream: Arc<DestinationStream>,
	) -> Box<dyn Task> {
		Box::new(OpenStreamTask {
			launcher,
			writer: Arc::clone(&self.writer),
			stream,
		})
	}
}

pub(super) struct ProcessRecordsTask {
	launcher: Arc<DestinationTaskLauncher>,
	writer: Arc<dyn DestinationWriter>,
	stream: Arc<DestinationStream>,
	file_envelope: BatchEnvelope<SpilledRawMessagesLocalFile>,
}

#[async_trait]
impl Task for ProcessRecordsTask {
	async fn execute(&mut self) -> Result<(), Error> {
		let batch = self
			.writer
			.process_records(&self.stream, &self.file_envelope.batch)
			.await?;

		trace!(
			stream = %self.stream.descriptor,
			state = ?batch.state(),
			"Spilled records processed"
		);

		// The batch covers exactly the records of the file it came from
		self.launcher
			.handle_new_batch(
				&self.stream.descriptor,
				BatchEnvelope::new(batch, self.file_envelope.range.clone()),
			)
			.await
	}
}

impl ProcessRecordsTaskFactory for DefaultTaskFactory {
	fn make(
		&self,
		launcher: Arc<DestinationTaskLauncher>,
		stream: Arc<DestinationStream>,
		file_envelope: BatchEnvelope<SpilledRawMessagesLocalFile>,
	) -> Box<dyn Task> {
		Box::new(ProcessRecordsTask {
			launcher,
			writer: Arc::clone(&self.writer),
			stream,
			file_envelope,
		})
	}
}

pub(super) struct ProcessBatchTask {
	launcher: Arc<DestinationTaskLauncher>,
	writer: Arc<dyn DestinationWriter>,
	stream: Arc<DestinationStream>,
	batch_envelope: BatchEnvelope,
}

#[async_trait]
impl Task for ProcessBatchTask {
	async fn execute(&mut self) -> Result<(), Error> {
		let next = self
			.writer
			.process_batch(&self.stream, Arc::clone(&self.batch_envelope.batch))
			.await?;

		let next_envelope = self.batch_envelope.clone().advance(next)?;

		self.launcher
			.handle_new_batch(&self.stream.descriptor, next_envelope)
			.await
	}
}

impl ProcessBatchTaskFactory for DefaultTaskFactory {
	fn make(
		&self,
		launcher: Arc<DestinationTaskLauncher>,
		stream: Arc<DestinationStream>,
		batch_envelope: BatchEnvelope,
	) -> Box<dyn Task> {
		Box::new(ProcessBatchTask {
			launcher,
			writer: Arc::clone(&self.writer),
			stream,
			batch_envelope,
		})
	}
}

pub(super) struct CloseStreamTask {
	launcher: Arc<DestinationTaskLauncher>,
	writer: Arc<dyn DestinationWriter>,
	stream: Arc<DestinationStream>,
}

#[async_trait]
impl Task for CloseStreamTask {
	async fn execute(&mut self) -> Result<(), Error> {
		self.writer.close_stream(&self.stream).await?;

		self.launcher
			.handle_stream_closed(&self.stream.descriptor)
			.await
	}
}

impl CloseStreamTaskFactory for DefaultTaskFactory {
	fn make(
		&self,
		launcher: Arc<DestinationTaskLauncher>,
		stream: Arc<DestinationStream>,
	) -> Box<dyn Task> {
		Box::new(CloseStreamTask {
			launcher,
			writer: Arc::clone(&self.writer),
			stream,
		})
	}
}
