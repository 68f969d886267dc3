use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use tracing::error;

use super::error::Error;

/// When the teardown task runs.
///
/// A teardown is a guaranteed finalizer: it runs whether the streams succeeded or failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownPolicy {
	/// One teardown for each stream closed event
	#[default]
	PerStreamClose,
	/// A single teardown, after every stream in the catalog was closed
	OncePerSync,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
	/// How many tasks may execute at the same time, defaults to the available parallelism
	pub max_concurrent_tasks: Option<NonZeroUsize>,
}

impl RunnerConfig {
	#[must_use]
	pub fn concurrency(&self) -> usize {
		self.max_concurrent_tasks.map_or_else(
			|| {
				std::thread::available_parallelism().map_or_else(
					|e| {
						error!(?e, "Failed to get available parallelism for the task runner");
						1
					},
					NonZeroUsize::get,
				)
			},
			NonZeroUsize::get,
		)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
	pub runner: RunnerConfig,
	pub teardown: TeardownPolicy,
	/// Stop the task runner as soon as a sync failure gets reported
	pub stop_on_sync_failure: bool,
}

impl LoadConfig {
	pub fn from_json(json: &str) -> Result<Self, Error> {
		serde_json::from_str(json).map_err(Error::Config)
	}
}
