use std::{collections::HashMap, sync::Arc};

use futures_concurrency::future::Join;
use tokio::sync::Mutex;

use super::{
	super::{
		catalog::{DestinationCatalog, StreamDescriptor},
		error::Error,
	},
	StreamManager,
};

/// Per-sync registry holding a [`StreamManager`] for each stream of the catalog.
///
/// The set of streams is fixed at creation, so lookups need no lock; only the managers
/// themselves are mutable.
#[derive(Debug)]
pub struct SyncManager {
	stream_managers: HashMap<StreamDescriptor, Arc<StreamManager>>,
	sync_failure: Mutex<Option<String>>,
}

impl SyncManager {
	#[must_use]
	pub fn new(catalog: &DestinationCatalog) -> Self {
		Self {
			stream_managers: catalog
				.streams()
				.iter()
				.map(|stream| {
					(
						stream.descriptor.clone(),
						Arc::new(StreamManager::new(stream.descriptor.clone())),
					)
				})
				.collect(),
			sync_failure: Mutex::default(),
		}
	}

	pub fn stream_manager(&self, descriptor: &StreamDescriptor) -> Result<&Arc<StreamManager>, Error> {
		self.stream_managers
			.get(descriptor)
			.ok_or_else(|| Error::StreamNotFound(descriptor.clone()))
	}

	pub fn stream_managers(&self) -> impl Iterator<Item = &Arc<StreamManager>> + '_ {
		self.stream_managers.values()
	}

	pub async fn all_streams_closed(&self) -> bool {
		self.stream_managers
			.values()
			.map(|manager| manager.is_closed())
			.collect::<Vec<_>>()
			.join()
			.await
			.into_iter()
			.all(|closed| closed)
	}

	/// Keeps the first reported failure only
	pub async fn mark_sync_failed(&self, reason: impl Into<String> + Send) {
		self.sync_failure
			.lock()
			.await
			.get_or_insert_with(|| reason.into());
	}

	pub async fn sync_failure(&self) -> Option<String> {
		self.sync_failure.lock().await.clone()
	}
}
