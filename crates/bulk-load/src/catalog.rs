use std::{collections::HashSet, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use super::error::Error;

/// Identity of a data stream, the key for every per-stream state in a sync.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamDescriptor {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
	pub name: String,
}

impl StreamDescriptor {
	pub fn new(namespace: Option<impl Into<String>>, name: impl Into<String>) -> Self {
		Self {
			namespace: namespace.map(Into::into),
			name: name.into(),
		}
	}
}

impl fmt::Display for StreamDescriptor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.namespace {
			Some(namespace) => write!(f, "{namespace}.{}", self.name),
			None => write!(f, "{}", self.name),
		}
	}
}

/// A stream as configured for the destination, handed to every per-stream task factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationStream {
	pub descriptor: StreamDescriptor,
	#[serde(default)]
	pub schema: serde_json::Value,
}

impl DestinationStream {
	#[must_use]
	pub const fn new(descriptor: StreamDescriptor) -> Self {
		Self {
			descriptor,
			schema: serde_json::Value::Null,
		}
	}
}

/// All streams taking part in a sync, in the order they were declared.
#[derive(Debug, Clone)]
pub struct DestinationCatalog {
	streams: Vec<Arc<DestinationStream>>,
}

#[derive(Deserialize)]
struct RawCatalog {
	streams: Vec<DestinationStream>,
}

impl DestinationCatalog {
	pub fn new(streams: impl IntoIterator<Item = DestinationStream>) -> Result<Self, Error> {
		let mut seen = HashSet::new();

		let streams = streams
			.into_iter()
			.map(|stream| {
				if seen.insert(stream.descriptor.clone()) {
					Ok(Arc::new(stream))
				} else {
					Err(Error::DuplicateStream(stream.descriptor))
				}
			})
			.collect::<Result<Vec<_>, _>>()?;

		Ok(Self { streams })
	}

	/// Loads a catalog from its JSON form: `{"streams": [{"descriptor": {...}, "schema": ...}]}`
	pub fn from_json(json: &str) -> Result<Self, Error> {
		let RawCatalog { streams } = serde_json::from_str(json).map_err(Error::Catalog)?;

		Self::new(streams)
	}

	#[must_use]
	pub fn streams(&self) -> &[Arc<DestinationStream>] {
		&self.streams
	}

	pub fn get_stream(&self, descriptor: &StreamDescriptor) -> Result<&Arc<DestinationStream>, Error> {
		self.streams
			.iter()
			.find(|stream| &stream.descriptor == descriptor)
			.ok_or_else(|| Error::StreamNotFound(descriptor.clone()))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.streams.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.streams.is_empty()
	}
}
