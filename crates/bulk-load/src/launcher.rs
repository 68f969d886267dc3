use std::{
	any::Any,
	fmt,
	panic::AssertUnwindSafe,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use async_trait::async_trait;
use futures::FutureExt;
use futures_concurrency::future::Join;
use tracing::{debug, instrument, trace, warn};

use super::{
	batch::{BatchEnvelope, SpilledRawMessagesLocalFile},
	catalog::{DestinationCatalog, StreamDescriptor},
	config::{LoadConfig, TeardownPolicy},
	error::Error,
	exception::{DefaultExceptionHandler, ExceptionHandler},
	factory::TaskFactories,
	runner::{Task, TaskId, TaskRunner},
	state::{NewBatchCheck, SyncManager},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
	Setup,
	SpillToDisk,
	OpenStream,
	ProcessRecords,
	ProcessBatch,
	CloseStream,
	Teardown,
}

/// Who a task failure is blamed on
#[derive(Debug, Clone)]
enum FailureScope {
	Sync,
	Stream(StreamDescriptor),
}

/// Wraps every task the launcher enqueues, so its failure always reaches the exception handler
/// and never the runner. A panicking task counts as a failed one.
struct RoutedTask {
	kind: TaskKind,
	scope: FailureScope,
	inner: Box<dyn Task>,
	exception_handler: Arc<dyn ExceptionHandler>,
}

#[async_trait]
impl Task for RoutedTask {
	async fn execute(&mut self) -> Result<(), Error> {
		trace!(kind = ?self.kind, "Executing task");

		let res = match AssertUnwindSafe(self.inner.execute()).catch_unwind().await {
			Ok(res) => res,
			Err(payload) => Err(Error::msg(format!(
				"task panicked: {}",
				panic_message(payload.as_ref())
			))),
		};

		if let Err(e) = res {
			match &self.scope {
				FailureScope::Sync => {
					debug!(kind = ?self.kind, ?e, "Task failed, reporting a sync failure;");
					self.exception_handler.handle_sync_failure(e).await;
				}
				FailureScope::Stream(descriptor) => {
					debug!(
						kind = ?self.kind,
						stream = %descriptor,
						?e,
						"Task failed, reporting a stream failure;"
					);
					self.exception_handler
						.handle_stream_failure(descriptor.clone(), e)
						.await;
				}
			}
		}

		Ok(())
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
	payload
		.downcast_ref::<&str>()
		.copied()
		.or_else(|| payload.downcast_ref::<String>().map(String::as_str))
		.unwrap_or("<non string panic payload>")
}

/// Decides which task runs next, in response to the lifecycle events of a sync.
///
/// Every handler can be called concurrently, from outside or from the tasks themselves as they
/// finish. Handlers never wait on task execution: they only update the per-stream state and
/// enqueue tasks on the [`TaskRunner`].
pub struct DestinationTaskLauncher {
	catalog: Arc<DestinationCatalog>,
	sync_manager: Arc<SyncManager>,
	runner: Arc<TaskRunner>,
	factories: TaskFactories,
	exception_handler: Arc<dyn ExceptionHandler>,
	teardown_policy: TeardownPolicy,
	teardown_enqueued: AtomicBool,
}

impl fmt::Debug for DestinationTaskLauncher {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("DestinationTaskLauncher")
			.field("streams", &self.catalog.len())
			.field("teardown_policy", &self.teardown_policy)
			.finish_non_exhaustive()
	}
}

impl DestinationTaskLauncher {
	#[must_use]
	pub fn new(
		catalog: Arc<DestinationCatalog>,
		sync_manager: Arc<SyncManager>,
		runner: Arc<TaskRunner>,
		factories: TaskFactories,
		exception_handler: Arc<dyn ExceptionHandler>,
		teardown_policy: TeardownPolicy,
	) -> Arc<Self> {
		Arc::new(Self {
			catalog,
			sync_manager,
			runner,
			factories,
			exception_handler,
			teardown_policy,
			teardown_enqueued: AtomicBool::new(false),
		})
	}

	/// Wires a launcher as `config` describes: a runner sized by `config.runner`, and a
	/// [`DefaultExceptionHandler`] that stops that runner on sync failures when
	/// `config.stop_on_sync_failure` is set.
	#[must_use]
	pub fn from_config(
		config: &LoadConfig,
		catalog: Arc<DestinationCatalog>,
		sync_manager: Arc<SyncManager>,
		factories: TaskFactories,
	) -> Arc<Self> {
		let runner = Arc::new(TaskRunner::new(&config.runner));

		let exception_handler = DefaultExceptionHandler::from_config(
			config,
			Arc::clone(&sync_manager),
			Arc::clone(&runner),
		);

		Self::new(
			catalog,
			sync_manager,
			runner,
			factories,
			Arc::new(exception_handler),
			config.teardown,
		)
	}

	#[must_use]
	pub fn catalog(&self) -> &Arc<DestinationCatalog> {
		&self.catalog
	}

	#[must_use]
	pub fn sync_manager(&self) -> &Arc<SyncManager> {
		&self.sync_manager
	}

	#[must_use]
	pub fn runner(&self) -> &Arc<TaskRunner> {
		&self.runner
	}

	async fn enqueue(
		&self,
		kind: TaskKind,
		scope: FailureScope,
		task: Box<dyn Task>,
	) -> Result<TaskId, Error> {
		let task_id = self
			.runner
			.enqueue(RoutedTask {
				kind,
				scope,
				inner: task,
				exception_handler: Arc::clone(&self.exception_handler),
			})
			.await?;

		trace!(%task_id, ?kind, "Launched task");

		Ok(task_id)
	}

	/// Launches the setup task, and the spill to disk task of every stream.
	///
	/// Spilling doesn't wait on setup: even if setup fails, spill tasks already queued run to
	/// completion.
	#[instrument(skip(self), err)]
	pub async fn start(self: &Arc<Self>) -> Result<(), Error> {
		debug!(streams = self.catalog.len(), "Starting sync");

		self.enqueue(
			TaskKind::Setup,
			FailureScope::Sync,
			self.factories.setup.make(Arc::clone(self)),
		)
		.await?;

		for stream in self.catalog.streams() {
			self.enqueue(
				TaskKind::SpillToDisk,
				FailureScope::Stream(stream.descriptor.clone()),
				self.factories
					.spill_to_disk
					.make(Arc::clone(self), Arc::clone(stream)),
			)
			.await?;
		}

		Ok(())
	}

	/// Opens every stream of the catalog
	#[instrument(skip(self), err)]
	pub async fn handle_setup_complete(self: &Arc<Self>) -> Result<(), Error> {
		self.catalog
			.streams()
			.iter()
			.map(|stream| async move {
				self.enqueue(
					TaskKind::OpenStream,
					FailureScope::Stream(stream.descriptor.clone()),
					self.factories
						.open_stream
						.make(Arc::clone(self), Arc::clone(stream)),
				)
				.await
				.map(|_| ())
			})
			.collect::<Vec<_>>()
			.join()
			.await
			.into_iter()
			.collect()
	}

	#[instrument(skip(self, descriptor), fields(stream = %descriptor), err)]
	pub async fn handle_stream_started(
		self: &Arc<Self>,
		descriptor: &StreamDescriptor,
	) -> Result<(), Error> {
		self.sync_manager
			.stream_manager(descriptor)?
			.mark_opened()
			.await;

		trace!("Stream opened");

		Ok(())
	}

	/// Hands the records spilled to a local file over to the destination
	#[instrument(
		skip(self, descriptor, file_envelope),
		fields(
			stream = %descriptor,
			records = file_envelope.batch.total_size_records,
		),
		err
	)]
	pub async fn handle_new_spilled_file(
		self: &Arc<Self>,
		descriptor: &StreamDescriptor,
		file_envelope: BatchEnvelope<SpilledRawMessagesLocalFile>,
	) -> Result<(), Error> {
		let stream = Arc::clone(self.catalog.get_stream(descriptor)?);

		self.enqueue(
			TaskKind::ProcessRecords,
			FailureScope::Stream(descriptor.clone()),
			self.factories
				.process_records
				.make(Arc::clone(self), stream, file_envelope),
		)
		.await
		.map(|_| ())
	}

	/// The central decision point of a stream's lifecycle.
	///
	/// The envelope's range, when present, is recorded as persisted whatever the batch state.
	/// A batch that isn't complete yet goes through another processing step. A complete batch
	/// closes the stream, but only once the destination flagged every batch of the stream as
	/// processed; otherwise nothing happens and a later complete batch will check again.
	#[instrument(
		skip(self, descriptor, batch_envelope),
		fields(
			stream = %descriptor,
			state = ?batch_envelope.state(),
			range = ?batch_envelope.range,
		),
		err
	)]
	pub async fn handle_new_batch(
		self: &Arc<Self>,
		descriptor: &StreamDescriptor,
		batch_envelope: BatchEnvelope,
	) -> Result<(), Error> {
		let stream = Arc::clone(self.catalog.get_stream(descriptor)?);

		let NewBatchCheck {
			opened,
			batch_processing_complete,
		} = self
			.sync_manager
			.stream_manager(descriptor)?
			.record_new_batch(batch_envelope.range.clone())
			.await;

		if !opened {
			warn!("Received a batch for a stream that wasn't started yet");
		}

		if !batch_envelope.state().is_complete() {
			trace!("Batch isn't complete, launching process batch task");

			return self
				.enqueue(
					TaskKind::ProcessBatch,
					FailureScope::Stream(descriptor.clone()),
					self.factories
						.process_batch
						.make(Arc::clone(self), stream, batch_envelope),
				)
				.await
				.map(|_| ());
		}

		if batch_processing_complete {
			debug!("Batch processing complete, launching close stream task");

			self.enqueue(
				TaskKind::CloseStream,
				FailureScope::Stream(descriptor.clone()),
				self.factories.close_stream.make(Arc::clone(self), stream),
			)
			.await?;
		} else {
			trace!("Batch complete but the stream still has batches being processed");
		}

		Ok(())
	}

	/// Launches the teardown, the step that runs whatever happened to the streams before
	#[instrument(
		skip(self, descriptor),
		fields(stream = %descriptor, policy = ?self.teardown_policy),
		err
	)]
	pub async fn handle_stream_closed(
		self: &Arc<Self>,
		descriptor: &StreamDescriptor,
	) -> Result<(), Error> {
		self.sync_manager
			.stream_manager(descriptor)?
			.mark_closed()
			.await;

		if self.teardown_policy == TeardownPolicy::OncePerSync {
			if !self.sync_manager.all_streams_closed().await {
				trace!("Waiting on other streams to close before teardown");
				return Ok(());
			}

			if self.teardown_enqueued.swap(true, Ordering::AcqRel) {
				trace!("Teardown was already launched");
				return Ok(());
			}
		}

		debug!("Launching teardown task");

		self.enqueue(
			TaskKind::Teardown,
			FailureScope::Sync,
			self.factories.teardown.make(Arc::clone(self)),
		)
		.await
		.map(|_| ())
	}

	/// Asks the runner to drain and finish, calling it more than once is harmless
	pub fn stop(&self) {
		debug!("Stopping task launcher");
		self.runner.stop();
	}
}
