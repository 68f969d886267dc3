use std::ops::RangeInclusive;

use tokio::sync::Mutex;
use tracing::{instrument, trace};

use super::super::{catalog::StreamDescriptor, range_set::RangeSet};

#[derive(Debug, Default)]
struct StreamState {
	persisted: RangeSet,
	batch_processing_complete: bool,
	opened: bool,
	closed: bool,
	failure: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct NewBatchCheck {
	pub opened: bool,
	pub batch_processing_complete: bool,
}

/// Completion bookkeeping for a single stream.
///
/// Every operation goes through the stream's own lock, so updates to one stream are totally
/// ordered while different streams never wait on each other.
#[derive(Debug)]
pub struct StreamManager {
	descriptor: StreamDescriptor,
	state: Mutex<StreamState>,
}

impl StreamManager {
	#[must_use]
	pub fn new(descriptor: StreamDescriptor) -> Self {
		Self {
			descriptor,
			state: Mutex::default(),
		}
	}

	#[must_use]
	pub const fn descriptor(&self) -> &StreamDescriptor {
		&self.descriptor
	}

	#[instrument(skip(self), fields(stream = %self.descriptor))]
	pub async fn record_persisted_range(&self, range: RangeInclusive<u64>) {
		let mut state = self.state.lock().await;
		state.persisted.insert(range);

		trace!(
			intervals = state.persisted.interval_count(),
			"Recorded persisted range"
		);
	}

	/// Whether every record offset in `[0, offset]` was confirmed persisted
	pub async fn are_records_persisted_until(&self, offset: u64) -> bool {
		self.state.lock().await.persisted.encloses(0..=offset)
	}

	/// Highest offset up to which every record is persisted, the signal a checkpoint would use
	pub async fn persisted_until(&self) -> Option<u64> {
		self.state.lock().await.persisted.contiguous_from_zero()
	}

	pub async fn persisted_ranges(&self) -> RangeSet {
		self.state.lock().await.persisted.clone()
	}

	/// Set by destination specific code once it knows every batch of the stream was processed
	pub async fn mark_batch_processing_complete(&self, complete: bool) {
		self.state.lock().await.batch_processing_complete = complete;
	}

	pub async fn is_batch_processing_complete(&self) -> bool {
		self.state.lock().await.batch_processing_complete
	}

	pub async fn mark_opened(&self) {
		self.state.lock().await.opened = true;
	}

	pub async fn is_opened(&self) -> bool {
		self.state.lock().await.opened
	}

	pub async fn mark_closed(&self) {
		self.state.lock().await.closed = true;
	}

	pub async fn is_closed(&self) -> bool {
		self.state.lock().await.closed
	}

	/// Keeps the first reported failure only
	pub async fn mark_failed(&self, reason: impl Into<String> + Send) {
		self.state
			.lock()
			.await
			.failure
			.get_or_insert_with(|| reason.into());
	}

	pub async fn failure(&self) -> Option<String> {
		self.state.lock().await.failure.clone()
	}

	/// Merges the range, when there is one, and reads the flags in a single critical section
	pub(crate) async fn record_new_batch(
		&self,
		maybe_range: Option<RangeInclusive<u64>>,
	) -> NewBatchCheck {
		let mut state = self.state.lock().await;

		if let Some(range) = maybe_range {
			state.persisted.insert(range);
		}

		NewBatchCheck {
			opened: state.opened,
			batch_processing_complete: state.batch_processing_complete,
		}
	}
}
