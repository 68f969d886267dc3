use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, trace};

use super::{
	super::{
		error::Error,
		factory::{SetupTaskFactory, TeardownTaskFactory},
		launcher::DestinationTaskLauncher,
		runner::Task,
	},
	DefaultTaskFactory, DestinationWriter,
};

pub(super) struct SetupTask {
	launcher: Arc<DestinationTaskLauncher>,
	writer: Arc<dyn DestinationWriter>,
}

#[async_trait]
impl Task for SetupTask {
	async fn execute(&mut self) -> Result<(), Error> {
		self.writer.setup().await?;

		debug!("Destination setup done");

		self.launcher.handle_setup_complete().await
	}
}

impl SetupTaskFactory for DefaultTaskFactory {
	fn make(&self, launcher: Arc<DestinationTaskLauncher>) -> Box<dyn Task> {
		Box::new(SetupTask {
			launcher,
			writer: Arc::clone(&self.writer),
		})
	}
}

pub(super) struct TeardownTask {
	launcher: Arc<DestinationTaskLauncher>,
	writer: Arc<dyn DestinationWriter>,
}

#[async_trait]
impl Task for TeardownTask {
	async fn execute(&mut self) -> Result<(), Error> {
		self.writer.teardown().await?;

		if self.launcher.sync_manager().all_streams_closed().await {
			debug!("Every stream is closed, stopping the sync");
			self.launcher.stop();
		} else {
			trace!("Teardown done, but some streams are still open");
		}

		Ok(())
	}
}

impl TeardownTaskFactory for DefaultTaskFactory {
	fn make(&self, launcher: Arc<DestinationTaskLauncher>) -> Box<dyn Task> {
		Box::new(TeardownTask {
			launcher,
			writer: Arc::clone(&self.writer),
		})
	}
}
