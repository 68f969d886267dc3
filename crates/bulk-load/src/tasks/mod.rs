//! Default task bodies, driven by a [`DestinationWriter`].
//!
//! Each task does its destination specific step, then reports to the launcher so the next
//! step of the stream gets launched.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
	batch::{Batch, SpilledRawMessagesLocalFile},
	catalog::DestinationStream,
	error::Error,
	factory::{SpillToDiskTaskFactory, TaskFactories},
};

mod setup;
mod stream;

/// Destination specific logic behind the default tasks.
///
/// Only record and batch processing have no sensible default. Signaling that every batch of a
/// stream was processed, with
/// [`StreamManager::mark_batch_processing_complete`](crate::StreamManager::mark_batch_processing_complete),
/// is also up to the writer.
#[async_trait]
pub trait DestinationWriter: Send + Sync + 'static {
	async fn setup(&self) -> Result<(), Error> {
		Ok(())
	}

	async fn open_stream(&self, _stream: &DestinationStream) -> Result<(), Error> {
		Ok(())
	}

	/// Turns spilled records into a batch, usually by uploading them
	async fn process_records(
		&self,
		stream: &DestinationStream,
		file: &SpilledRawMessagesLocalFile,
	) -> Result<Arc<dyn Batch>, Error>;

	/// Moves a batch further along, the returned batch can't be in an earlier state
	async fn process_batch(
		&self,
		stream: &DestinationStream,
		batch: Arc<dyn Batch>,
	) -> Result<Arc<dyn Batch>, Error>;

	async fn close_stream(&self, _stream: &DestinationStream) -> Result<(), Error> {
		Ok(())
	}

	async fn teardown(&self) -> Result<(), Error> {
		Ok(())
	}
}

/// Builds every default task from the same writer
struct DefaultTaskFactory {
	writer: Arc<dyn DestinationWriter>,
}

impl TaskFactories {
	/// Default factories for every role but spilling to disk, which is always caller supplied.
	pub fn for_writer(
		writer: Arc<dyn DestinationWriter>,
		spill_to_disk: Arc<dyn SpillToDiskTaskFactory>,
	) -> Self {
		let default = Arc::new(DefaultTaskFactory { writer });

		Self {
			setup: Arc::clone(&default) as _,
			spill_to_disk,
			open_stream: Arc::clone(&default) as _,
			process_records: Arc::clone(&default) as _,
			process_batch: Arc::clone(&default) as _,
			close_stream: Arc::clone(&default) as _,
			teardown: default,
		}
	}
}
