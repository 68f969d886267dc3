use std::{fmt, ops::RangeInclusive, path::PathBuf, sync::Arc};

use downcast_rs::{impl_downcast, DowncastSync};

use super::error::Error;

/// Lifecycle of a batch, ordered: a batch only ever moves forward through these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BatchState {
	/// Written to a local buffer, not yet handed to the destination
	Staged,
	/// Durably written by the destination, but its processing isn't finished
	Persisted,
	/// The destination is done with this batch
	Complete,
}

impl BatchState {
	#[must_use]
	pub const fn is_complete(self) -> bool {
		matches!(self, Self::Complete)
	}
}

/// An opaque unit of processed data, produced by destination specific code.
///
/// Destinations get their own concrete type back with `downcast_arc`.
pub trait Batch: DowncastSync + fmt::Debug {
	fn state(&self) -> BatchState;
}

impl_downcast!(sync Batch);

/// A batch plus the record offsets, within its stream, that it covers.
#[derive(Debug)]
pub struct BatchEnvelope<B = Arc<dyn Batch>> {
	pub batch: B,
	pub range: Option<RangeInclusive<u64>>,
}

impl<B: Clone> Clone for BatchEnvelope<B> {
	fn clone(&self) -> Self {
		Self {
			batch: self.batch.clone(),
			range: self.range.clone(),
		}
	}
}

impl<B> BatchEnvelope<B> {
	pub const fn new(batch: B, range: Option<RangeInclusive<u64>>) -> Self {
		Self { batch, range }
	}

	pub const fn with_range(batch: B, range: RangeInclusive<u64>) -> Self {
		Self {
			batch,
			range: Some(range),
		}
	}

	pub const fn without_range(batch: B) -> Self {
		Self { batch, range: None }
	}
}

impl BatchEnvelope {
	/// Replaces the wrapped batch by the outcome of processing it, keeping the covered range.
	pub fn advance(self, next: Arc<dyn Batch>) -> Result<Self, Error> {
		let (from, to) = (self.batch.state(), next.state());
		if to < from {
			return Err(Error::BatchStateRegression { from, to });
		}

		Ok(Self {
			batch: next,
			range: self.range,
		})
	}

	#[must_use]
	pub fn state(&self) -> BatchState {
		self.batch.state()
	}

	/// Same batch and same range, used to check an envelope went through untouched
	#[must_use]
	pub fn is_same(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.batch, &other.batch) && self.range == other.range
	}
}

impl<B: Batch> BatchEnvelope<B> {
	/// Erases the concrete batch type
	pub fn into_dyn(self) -> BatchEnvelope {
		BatchEnvelope {
			batch: Arc::new(self.batch),
			range: self.range,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
	pub path: PathBuf,
}

impl LocalFile {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

/// The outcome of spilling raw records to disk: where they are and how many there are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpilledRawMessagesLocalFile {
	pub local_file: LocalFile,
	pub total_size_records: u64,
}

impl SpilledRawMessagesLocalFile {
	#[must_use]
	pub const fn new(local_file: LocalFile, total_size_records: u64) -> Self {
		Self {
			local_file,
			total_size_records,
		}
	}
}

impl Batch for SpilledRawMessagesLocalFile {
	fn state(&self) -> BatchState {
		BatchState::Staged
	}
}
