use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, instrument};

use super::{
	catalog::StreamDescriptor, config::LoadConfig, error::Error, runner::TaskRunner,
	state::SyncManager,
};

/// Sink for every task failure observed during a sync.
///
/// Each failure is routed to exactly one of these methods, never both.
#[async_trait]
pub trait ExceptionHandler: Send + Sync + 'static {
	/// A failure that compromises the whole sync, like a failed setup
	async fn handle_sync_failure(&self, error: Error);

	/// A failure confined to one stream, the other streams keep going
	async fn handle_stream_failure(&self, descriptor: StreamDescriptor, error: Error);
}

/// Logs failures and records them in the sync state, so they show up in the sync outcome.
#[derive(Debug)]
pub struct DefaultExceptionHandler {
	sync_manager: Arc<SyncManager>,
	maybe_runner_to_stop: Option<Arc<TaskRunner>>,
}

impl DefaultExceptionHandler {
	#[must_use]
	pub const fn new(sync_manager: Arc<SyncManager>) -> Self {
		Self {
			sync_manager,
			maybe_runner_to_stop: None,
		}
	}

	/// Also stops the runner on the first sync failure
	#[must_use]
	pub fn stopping_on_sync_failure(mut self, runner: Arc<TaskRunner>) -> Self {
		self.maybe_runner_to_stop = Some(runner);
		self
	}

	/// Stops `runner` on sync failures only when `stop_on_sync_failure` is set
	#[must_use]
	pub fn from_config(
		config: &LoadConfig,
		sync_manager: Arc<SyncManager>,
		runner: Arc<TaskRunner>,
	) -> Self {
		let handler = Self::new(sync_manager);

		if config.stop_on_sync_failure {
			handler.stopping_on_sync_failure(runner)
		} else {
			handler
		}
	}
}

#[async_trait]
impl ExceptionHandler for DefaultExceptionHandler {
	#[instrument(skip_all)]
	async fn handle_sync_failure(&self, error: Error) {
		error!(?error, "Sync failed;");

		self.sync_manager.mark_sync_failed(error.to_string()).await;

		if let Some(runner) = &self.maybe_runner_to_stop {
			runner.stop();
		}
	}

	#[instrument(skip(self, error), fields(stream = %descriptor))]
	async fn handle_stream_failure(&self, descriptor: StreamDescriptor, error: Error) {
		error!(?error, "Stream failed;");

		match self.sync_manager.stream_manager(&descriptor) {
			Ok(stream_manager) => stream_manager.mark_failed(error.to_string()).await,
			Err(e) => error!(?e, "Failure reported for a stream outside of the catalog"),
		}
	}
}
