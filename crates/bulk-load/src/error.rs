use thiserror::Error;

use super::{batch::BatchState, catalog::StreamDescriptor};

#[derive(Debug, Error)]
pub enum Error {
	#[error("stream not found in catalog: <stream='{0}'>")]
	StreamNotFound(StreamDescriptor),
	#[error("stream declared twice in catalog: <stream='{0}'>")]
	DuplicateStream(StreamDescriptor),
	#[error("batch state can't go back: <from='{from:?}', to='{to:?}'>")]
	BatchStateRegression { from: BatchState, to: BatchState },

	#[error("failed to load destination catalog: {0}")]
	Catalog(#[source] serde_json::Error),
	#[error("failed to load configuration: {0}")]
	Config(#[source] serde_json::Error),

	#[error("destination error: {0}")]
	Destination(#[source] Box<dyn std::error::Error + Send + Sync>),
	#[error("{0}")]
	Message(String),

	#[error(transparent)]
	System(#[from] SystemError),
}

impl Error {
	/// Wraps any error coming from destination specific code
	pub fn destination(e: impl std::error::Error + Send + Sync + 'static) -> Self {
		Self::Destination(Box::new(e))
	}

	pub fn msg(msg: impl Into<String>) -> Self {
		Self::Message(msg.into())
	}
}

#[derive(Debug, Error)]
pub enum SystemError {
	#[error("task runner was stopped and doesn't accept new tasks")]
	Shutdown,
	#[error("task runner is already running")]
	AlreadyRunning,
	#[error("task runner finished with unhandled task faults <count='{count}'>")]
	UnhandledTaskFaults { count: usize },
}
