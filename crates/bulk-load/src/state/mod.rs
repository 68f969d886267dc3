mod stream;
mod sync;

pub(crate) use stream::NewBatchCheck;
pub use stream::StreamManager;
pub use sync::SyncManager;
