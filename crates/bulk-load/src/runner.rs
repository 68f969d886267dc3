use std::{
	fmt,
	panic::AssertUnwindSafe,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

use async_channel as chan;
use async_trait::async_trait;
use futures::{stream::FuturesUnordered, FutureExt, StreamExt};
use tokio::{
	spawn,
	sync::{OwnedSemaphorePermit, Semaphore},
	task::JoinHandle,
};
use tracing::{debug, error, instrument, trace, trace_span, warn, Instrument};
use uuid::Uuid;

use super::{
	config::RunnerConfig,
	error::{Error, SystemError},
};

/// A unique identifier for a queued task using the [`uuid`](https://docs.rs/uuid) crate.
pub type TaskId = Uuid;

/// A unit of work executed by the [`TaskRunner`].
///
/// The runner knows nothing about what a task does. An error returned from [`Task::execute`]
/// reaches the runner only when nobody upstream handled it, and is then reported as an
/// unhandled fault. Tasks built by the launcher always route their own errors to the exception
/// handler instead.
///
/// We're currently using the [`async_trait`](https://docs.rs/async-trait) crate to allow dyn async traits,
/// due to a limitation in the Rust language.
#[async_trait]
pub trait Task: Send + 'static {
	async fn execute(&mut self) -> Result<(), Error>;
}

impl fmt::Debug for Box<dyn Task> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "<Task>")
	}
}

/// A helper trait to convert any type that implements [`Task`] into a [`Box<dyn Task>`], boxing it.
pub trait IntoTask: Send {
	fn into_task(self) -> Box<dyn Task>;
}

/// Blanket implementation for all types that implements [`Task`]
impl<T: Task> IntoTask for T {
	fn into_task(self) -> Box<dyn Task> {
		Box::new(self)
	}
}

impl IntoTask for Box<dyn Task> {
	fn into_task(self) -> Box<dyn Task> {
		self
	}
}

#[derive(Debug)]
struct QueuedTask {
	id: TaskId,
	task: Box<dyn Task>,
}

enum TaskOutcome {
	Done,
	Failed(Error),
	Panicked,
}

/// Executes queued tasks concurrently, up to a configured capacity.
///
/// Enqueueing never waits for capacity, so whoever produces tasks is never blocked by a slow
/// or stuck one. [`TaskRunner::stop`] closes the queue: tasks already queued still run, and
/// [`TaskRunner::run`] returns once every one of them is done.
#[derive(Debug)]
pub struct TaskRunner {
	queue_tx: chan::Sender<QueuedTask>,
	queue_rx: chan::Receiver<QueuedTask>,
	concurrency: usize,
	is_running: AtomicBool,
}

impl TaskRunner {
	#[must_use]
	pub fn new(config: &RunnerConfig) -> Self {
		let (queue_tx, queue_rx) = chan::unbounded();

		Self {
			queue_tx,
			queue_rx,
			concurrency: config.concurrency(),
			is_running: AtomicBool::new(false),
		}
	}

	#[must_use]
	pub const fn concurrency(&self) -> usize {
		self.concurrency
	}

	pub async fn enqueue(&self, into_task: impl IntoTask) -> Result<TaskId, SystemError> {
		let id = TaskId::new_v4();

		self.queue_tx
			.send(QueuedTask {
				id,
				task: into_task.into_task(),
			})
			.await
			.map_err(|_| SystemError::Shutdown)?;

		trace!(task_id = %id, "Task enqueued");

		Ok(id)
	}

	/// Stops accepting new tasks, calling it more than once has no further effect
	pub fn stop(&self) {
		if self.queue_tx.close() {
			debug!(pending_tasks = self.queue_rx.len(), "Task runner stop requested");
		} else {
			trace!("Task runner was already stopped");
		}
	}

	#[must_use]
	pub fn is_stopped(&self) -> bool {
		self.queue_tx.is_closed()
	}

	#[instrument(name = "task_runner", skip(self), fields(concurrency = self.concurrency))]
	pub async fn run(&self) -> Result<(), SystemError> {
		if self.is_running.swap(true, Ordering::AcqRel) {
			warn!("Tried to run a task runner that is already running");
			return Err(SystemError::AlreadyRunning);
		}

		let _running = RunningGuard(&self.is_running);

		let semaphore = Arc::new(Semaphore::new(self.concurrency));
		let mut in_flight = FuturesUnordered::<JoinHandle<(TaskId, TaskOutcome)>>::new();
		let mut unhandled_faults = 0;

		trace!("Task runner started");

		loop {
			tokio::select! {
				res = self.queue_rx.recv() => {
					let Ok(QueuedTask { id, task }) = res else {
						// Queue closed and drained
						break;
					};

					let permit = Arc::clone(&semaphore)
						.acquire_owned()
						.await
						.expect("the runner semaphore is never closed");

					in_flight.push(spawn(
						run_single_task(id, task, permit).instrument(trace_span!("task", task_id = %id)),
					));
				}

				Some(res) = in_flight.next(), if !in_flight.is_empty() => {
					unhandled_faults += usize::from(!handle_task_outcome(res));
				}
			}
		}

		trace!(in_flight = in_flight.len(), "Task runner draining in flight tasks");

		while let Some(res) = in_flight.next().await {
			unhandled_faults += usize::from(!handle_task_outcome(res));
		}

		if unhandled_faults > 0 {
			error!(%unhandled_faults, "Task runner finished with unhandled task faults");
			return Err(SystemError::UnhandledTaskFaults {
				count: unhandled_faults,
			});
		}

		debug!("Task runner gracefully finished");

		Ok(())
	}
}

/// Clears the running flag however `run` ends, even when its future is dropped midway
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
	fn drop(&mut self) {
		self.0.store(false, Ordering::Release);
	}
}

async fn run_single_task(
	id: TaskId,
	mut task: Box<dyn Task>,
	_permit: OwnedSemaphorePermit,
) -> (TaskId, TaskOutcome) {
	trace!("Running task");

	let outcome = match AssertUnwindSafe(task.execute()).catch_unwind().await {
		Ok(Ok(())) => TaskOutcome::Done,
		Ok(Err(e)) => TaskOutcome::Failed(e),
		Err(_) => TaskOutcome::Panicked,
	};

	(id, outcome)
}

/// Returns `false` on faults that nobody handled
fn handle_task_outcome(res: Result<(TaskId, TaskOutcome), tokio::task::JoinError>) -> bool {
	match res {
		Ok((task_id, TaskOutcome::Done)) => {
			trace!(%task_id, "Task done");
			true
		}
		Ok((task_id, TaskOutcome::Failed(e))) => {
			error!(%task_id, ?e, "Task failed and the error wasn't handled;");
			false
		}
		Ok((task_id, TaskOutcome::Panicked)) => {
			error!(%task_id, "Task panicked");
			false
		}
		Err(e) => {
			error!(?e, "Task failed to join");
			false
		}
	}
}
