#![allow(dead_code)]

use sd_bulk_load::{
	Batch, BatchEnvelope, BatchState, CloseStreamTaskFactory, DestinationCatalog,
	DestinationStream, DestinationTaskLauncher, Error, ExceptionHandler, OpenStreamTaskFactory,
	ProcessBatchTaskFactory, ProcessRecordsTaskFactory, RunnerConfig, SetupTaskFactory,
	SpillToDiskTaskFactory, SpilledRawMessagesLocalFile, StreamDescriptor, SyncManager,
	SystemError, Task, TaskFactories, TaskRunner, TeardownPolicy, TeardownTaskFactory,
};

use std::{collections::HashMap, fmt, future::Future, sync::Arc, time::Duration};

use async_channel as chan;
use async_trait::async_trait;
use tokio::{spawn, task::JoinHandle, time::timeout};

pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Awaits a mock signal, failing the test instead of hanging forever
pub async fn recv<T>(rx: &chan::Receiver<T>) -> T {
	timeout(TIMEOUT, rx.recv())
		.await
		.expect("timed out waiting on a task signal")
		.expect("task signal channel closed")
}

pub async fn within<F: Future>(fut: F) -> F::Output {
	timeout(TIMEOUT, fut).await.expect("timed out")
}

pub fn stream1() -> StreamDescriptor {
	StreamDescriptor::new(Some("test"), "stream1")
}

pub fn stream2() -> StreamDescriptor {
	StreamDescriptor::new(Some("test"), "stream2")
}

pub fn catalog() -> Arc<DestinationCatalog> {
	Arc::new(
		DestinationCatalog::new([
			DestinationStream::new(stream1()),
			DestinationStream::new(stream2()),
		])
		.expect("static catalog is valid"),
	)
}

/// Unbounded channel a mock task sends to when it runs
#[derive(Debug)]
pub struct Signal<T> {
	pub tx: chan::Sender<T>,
	pub rx: chan::Receiver<T>,
}

impl<T> Default for Signal<T> {
	fn default() -> Self {
		let (tx, rx) = chan::unbounded();
		Self { tx, rx }
	}
}

impl<T> Signal<T> {
	pub fn count(&self) -> usize {
		self.rx.len()
	}
}

/// How a mock task ends, after signaling that it ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	Done,
	Fail(&'static str),
	Panic(&'static str),
}

struct SignalTask<T: Send + 'static> {
	tx: chan::Sender<T>,
	payload: Option<T>,
	outcome: Outcome,
}

#[async_trait]
impl<T: Send + 'static> Task for SignalTask<T> {
	async fn execute(&mut self) -> Result<(), Error> {
		if let Some(payload) = self.payload.take() {
			self.tx.send(payload).await.expect("signal channel closed");
		}

		match self.outcome {
			Outcome::Done => Ok(()),
			Outcome::Fail(msg) => Err(Error::msg(msg)),
			Outcome::Panic(msg) => panic!("{msg}"),
		}
	}
}

fn signal_task<T: Send + 'static>(
	signal: &Signal<T>,
	payload: T,
	outcome: Outcome,
) -> Box<dyn Task> {
	Box::new(SignalTask {
		tx: signal.tx.clone(),
		payload: Some(payload),
		outcome,
	})
}

#[derive(Debug)]
pub struct MockBatch(pub BatchState);

impl Batch for MockBatch {
	fn state(&self) -> BatchState {
		self.0
	}
}

pub fn envelope(state: BatchState, range: Option<std::ops::RangeInclusive<u64>>) -> BatchEnvelope {
	BatchEnvelope::new(Arc::new(MockBatch(state)) as Arc<dyn Batch>, range)
}

/// Setup that always fails
#[derive(Debug, Default)]
pub struct MockSetupTaskFactory {
	pub has_run: Signal<()>,
}

impl SetupTaskFactory for MockSetupTaskFactory {
	fn make(&self, _launcher: Arc<DestinationTaskLauncher>) -> Box<dyn Task> {
		signal_task(&self.has_run, (), Outcome::Fail("Setup task failed"))
	}
}

#[derive(Debug)]
pub struct MockSpillToDiskTaskFactory {
	pub stream_has_run: HashMap<StreamDescriptor, Signal<()>>,
}

impl MockSpillToDiskTaskFactory {
	pub fn new(catalog: &DestinationCatalog) -> Self {
		Self {
			stream_has_run: catalog
				.streams()
				.iter()
				.map(|stream| (stream.descriptor.clone(), Signal::default()))
				.collect(),
		}
	}
}

impl SpillToDiskTaskFactory for MockSpillToDiskTaskFactory {
	fn make(
		&self,
		_launcher: Arc<DestinationTaskLauncher>,
		stream: Arc<DestinationStream>,
	) -> Box<dyn Task> {
		signal_task(&self.stream_has_run[&stream.descriptor], (), Outcome::Done)
	}
}

/// Open stream that ends with `failure` for every stream in `failing`
#[derive(Debug)]
pub struct MockOpenStreamTaskFactory {
	pub stream_has_run: HashMap<StreamDescriptor, Signal<()>>,
	pub failing: Vec<StreamDescriptor>,
	pub failure: Outcome,
}

impl MockOpenStreamTaskFactory {
	pub fn new(catalog: &DestinationCatalog) -> Self {
		Self {
			stream_has_run: catalog
				.streams()
				.iter()
				.map(|stream| (stream.descriptor.clone(), Signal::default()))
				.collect(),
			failing: catalog
				.streams()
				.iter()
				.map(|stream| stream.descriptor.clone())
				.collect(),
			failure: Outcome::Fail("Open stream task failed"),
		}
	}
}

impl OpenStreamTaskFactory for MockOpenStreamTaskFactory {
	fn make(
		&self,
		_launcher: Arc<DestinationTaskLauncher>,
		stream: Arc<DestinationStream>,
	) -> Box<dyn Task> {
		signal_task(
			&self.stream_has_run[&stream.descriptor],
			(),
			if self.failing.contains(&stream.descriptor) {
				self.failure
			} else {
				Outcome::Done
			},
		)
	}
}

#[derive(Debug, Default)]
pub struct MockProcessRecordsTaskFactory {
	pub has_run: Signal<(StreamDescriptor, BatchEnvelope<SpilledRawMessagesLocalFile>)>,
}

impl ProcessRecordsTaskFactory for MockProcessRecordsTaskFactory {
	fn make(
		&self,
		_launcher: Arc<DestinationTaskLauncher>,
		stream: Arc<DestinationStream>,
		file_envelope: BatchEnvelope<SpilledRawMessagesLocalFile>,
	) -> Box<dyn Task> {
		signal_task(
			&self.has_run,
			(stream.descriptor.clone(), file_envelope),
			Outcome::Done,
		)
	}
}

#[derive(Debug, Default)]
pub struct MockProcessBatchTaskFactory {
	pub has_run: Signal<BatchEnvelope>,
}

impl ProcessBatchTaskFactory for MockProcessBatchTaskFactory {
	fn make(
		&self,
		_launcher: Arc<DestinationTaskLauncher>,
		_stream: Arc<DestinationStream>,
		batch_envelope: BatchEnvelope,
	) -> Box<dyn Task> {
		signal_task(&self.has_run, batch_envelope, Outcome::Done)
	}
}

#[derive(Debug, Default)]
pub struct MockCloseStreamTaskFactory {
	pub has_run: Signal<StreamDescriptor>,
}

impl CloseStreamTaskFactory for MockCloseStreamTaskFactory {
	fn make(
		&self,
		_launcher: Arc<DestinationTaskLauncher>,
		stream: Arc<DestinationStream>,
	) -> Box<dyn Task> {
		signal_task(&self.has_run, stream.descriptor.clone(), Outcome::Done)
	}
}

#[derive(Debug, Default)]
pub struct MockTeardownTaskFactory {
	pub has_run: Signal<()>,
}

impl TeardownTaskFactory for MockTeardownTaskFactory {
	fn make(&self, _launcher: Arc<DestinationTaskLauncher>) -> Box<dyn Task> {
		signal_task(&self.has_run, (), Outcome::Done)
	}
}

#[derive(Debug, Default)]
pub struct MockExceptionHandler {
	pub sync_failures: Signal<Error>,
	pub stream_failures: Signal<(StreamDescriptor, Error)>,
}

#[async_trait]
impl ExceptionHandler for MockExceptionHandler {
	async fn handle_sync_failure(&self, error: Error) {
		self.sync_failures
			.tx
			.send(error)
			.await
			.expect("sync failure channel closed");
	}

	async fn handle_stream_failure(&self, descriptor: StreamDescriptor, error: Error) {
		self.stream_failures
			.tx
			.send((descriptor, error))
			.await
			.expect("stream failure channel closed");
	}
}

pub struct Mocks {
	pub setup: Arc<MockSetupTaskFactory>,
	pub spill_to_disk: Arc<MockSpillToDiskTaskFactory>,
	pub open_stream: Arc<MockOpenStreamTaskFactory>,
	pub process_records: Arc<MockProcessRecordsTaskFactory>,
	pub process_batch: Arc<MockProcessBatchTaskFactory>,
	pub close_stream: Arc<MockCloseStreamTaskFactory>,
	pub teardown: Arc<MockTeardownTaskFactory>,
	pub exception_handler: Arc<MockExceptionHandler>,
}

impl Mocks {
	pub fn new(catalog: &DestinationCatalog) -> Self {
		Self::with_open_stream(MockOpenStreamTaskFactory::new(catalog), catalog)
	}

	pub fn with_open_stream(
		open_stream: MockOpenStreamTaskFactory,
		catalog: &DestinationCatalog,
	) -> Self {
		Self {
			setup: Arc::default(),
			spill_to_disk: Arc::new(MockSpillToDiskTaskFactory::new(catalog)),
			open_stream: Arc::new(open_stream),
			process_records: Arc::default(),
			process_batch: Arc::default(),
			close_stream: Arc::default(),
			teardown: Arc::default(),
			exception_handler: Arc::default(),
		}
	}

	pub fn factories(&self) -> TaskFactories {
		TaskFactories {
			setup: Arc::clone(&self.setup) as _,
			spill_to_disk: Arc::clone(&self.spill_to_disk) as _,
			open_stream: Arc::clone(&self.open_stream) as _,
			process_records: Arc::clone(&self.process_records) as _,
			process_batch: Arc::clone(&self.process_batch) as _,
			close_stream: Arc::clone(&self.close_stream) as _,
			teardown: Arc::clone(&self.teardown) as _,
		}
	}
}

/// A launcher wired to mock factories, with its runner already running
pub struct Harness {
	pub launcher: Arc<DestinationTaskLauncher>,
	pub mocks: Mocks,
	run_handle: JoinHandle<Result<(), SystemError>>,
}

impl fmt::Debug for Harness {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<Harness>")
	}
}

impl Harness {
	pub fn new(teardown_policy: TeardownPolicy) -> Self {
		let catalog = catalog();
		let mocks = Mocks::new(&catalog);
		Self::with_mocks(catalog, mocks, teardown_policy)
	}

	pub fn with_mocks(
		catalog: Arc<DestinationCatalog>,
		mocks: Mocks,
		teardown_policy: TeardownPolicy,
	) -> Self {
		let sync_manager = Arc::new(SyncManager::new(&catalog));
		let runner = Arc::new(TaskRunner::new(&RunnerConfig::default()));

		let launcher = DestinationTaskLauncher::new(
			catalog,
			sync_manager,
			Arc::clone(&runner),
			mocks.factories(),
			Arc::clone(&mocks.exception_handler) as _,
			teardown_policy,
		);

		let run_handle = spawn(async move { runner.run().await });

		Self {
			launcher,
			mocks,
			run_handle,
		}
	}

	/// Stops the launcher and waits for the runner to drain every queued task
	pub async fn stop(self) -> Mocks {
		self.launcher.stop();

		within(self.run_handle)
			.await
			.expect("runner task panicked")
			.expect("runner finished with unhandled faults");

		self.mocks
	}
}
