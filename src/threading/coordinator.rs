use crate::foundation::error::{IprError, IprResult};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded, select, unbounded};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::ThreadId;
use std::time::Duration;

/// One of the two coordinated threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Lane {
    /// The host/UI thread.
    Host,
    /// The render worker thread.
    Worker,
}

/// How the worker lane is driven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadingMode {
    /// A dedicated worker thread drains the worker lane.
    #[default]
    Dedicated,
    /// Both lanes are bound to the host thread; the host's pump ticks the worker lane.
    Inline,
}

type OnceWork = Box<dyn FnOnce() + Send>;
type RepeatWork = Box<dyn FnMut() -> bool + Send>;

/// Unit of work queued on a lane.
pub enum Task {
    /// Run once.
    Once(OnceWork),
    /// Run on every tick until it returns `false` or the coordinator is cancelled.
    KeepRunning(RepeatWork),
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Task::Once(_) => f.write_str("Task::Once"),
            Task::KeepRunning(_) => f.write_str("Task::KeepRunning"),
        }
    }
}

/// Result of one [`Coordinator::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    /// Queued tasks executed.
    pub tasks_run: usize,
    /// Keep-running closures invoked.
    pub repeaters_run: usize,
    /// Keep-running closures still registered afterwards.
    pub repeaters_alive: usize,
}

struct LaneQueue {
    tx: Sender<Task>,
    rx: Receiver<Task>,
    owner: OnceLock<ThreadId>,
    repeaters: Mutex<Vec<RepeatWork>>,
}

impl LaneQueue {
    fn new() -> Self {
        let (tx, rx) = unbounded();
        Self {
            tx,
            rx,
            owner: OnceLock::new(),
            repeaters: Mutex::new(Vec::new()),
        }
    }
}

struct Inner {
    host: LaneQueue,
    worker: LaneQueue,
    cancelled: AtomicBool,
}

/// Shared two-lane scheduler. Cloning is cheap and every clone addresses the same queues.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    /// Unbound coordinator; call [`Self::bind`] from each participating thread.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                host: LaneQueue::new(),
                worker: LaneQueue::new(),
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    fn queue(&self, lane: Lane) -> &LaneQueue {
        match lane {
            Lane::Host => &self.inner.host,
            Lane::Worker => &self.inner.worker,
        }
    }

    /// Bind `lane` to the calling thread. Binding twice from the same thread is a no-op;
    /// binding from a different thread is rejected.
    pub fn bind(&self, lane: Lane) -> IprResult<()> {
        let me = std::thread::current().id();
        let owner = *self.queue(lane).owner.get_or_init(|| me);
        if owner != me {
            return Err(IprError::coordination(format!(
                "{lane:?} lane is already bound to another thread"
            )));
        }
        Ok(())
    }

    /// `true` when the calling thread is bound to `lane`.
    pub fn is_current(&self, lane: Lane) -> bool {
        self.queue(lane)
            .owner
            .get()
            .is_some_and(|t| *t == std::thread::current().id())
    }

    /// Lane bound to the calling thread, host first.
    pub fn lane_of_current(&self) -> Option<Lane> {
        [Lane::Host, Lane::Worker]
            .into_iter()
            .find(|l| self.is_current(*l))
    }

    /// Queue a fire-and-forget task on `lane`.
    pub fn post(&self, lane: Lane, f: impl FnOnce() + Send + 'static) {
        self.send(lane, Task::Once(Box::new(f)));
    }

    /// Queue a fire-and-forget task on the host lane.
    pub fn post_to_host(&self, f: impl FnOnce() + Send + 'static) {
        self.post(Lane::Host, f);
    }

    /// Queue a fire-and-forget task on the worker lane.
    pub fn post_to_worker(&self, f: impl FnOnce() + Send + 'static) {
        self.post(Lane::Worker, f);
    }

    /// Register a closure to run on every tick of `lane` until it returns `false`.
    pub fn keep_running(&self, lane: Lane, f: impl FnMut() -> bool + Send + 'static) {
        self.send(lane, Task::KeepRunning(Box::new(f)));
    }

    fn send(&self, lane: Lane, task: Task) {
        // Both channel ends live in `Inner`, so the receiver outlives every sender.
        let _ = self.queue(lane).tx.send(task);
    }

    /// Run `f` on `lane` and block until it has executed, returning its result.
    ///
    /// Runs inline when the caller is bound to `lane`. While blocked, the caller keeps draining its
    /// own lane so a rendezvous in the opposite direction cannot deadlock.
    pub fn run_and_wait<R: Send + 'static>(
        &self,
        lane: Lane,
        f: impl FnOnce() -> R + Send + 'static,
    ) -> IprResult<R> {
        if self.is_current(lane) {
            return Ok(f());
        }
        let (tx, rx) = bounded(1);
        self.post(lane, move || {
            let _ = tx.send(f());
        });
        self.await_reply(&rx)
    }

    /// [`Self::run_and_wait`] targeting the host lane.
    pub fn run_on_host_and_wait<R: Send + 'static>(
        &self,
        f: impl FnOnce() -> R + Send + 'static,
    ) -> IprResult<R> {
        self.run_and_wait(Lane::Host, f)
    }

    /// Block on `rx` while servicing the caller's own lane.
    ///
    /// Fails when every sender is dropped without a reply (the task was discarded or panicked).
    pub fn await_reply<T>(&self, rx: &Receiver<T>) -> IprResult<T> {
        let closed = || IprError::coordination("reply channel closed before a value was sent");
        let Some(own) = self.lane_of_current() else {
            return rx.recv().map_err(|_| closed());
        };
        let own_rx = self.queue(own).rx.clone();
        loop {
            select! {
                recv(rx) -> msg => return msg.map_err(|_| closed()),
                recv(own_rx) -> task => {
                    if let Ok(task) = task {
                        self.execute(own, task);
                    }
                }
            }
        }
    }

    fn execute(&self, lane: Lane, task: Task) {
        match task {
            Task::Once(f) => f(),
            Task::KeepRunning(f) => self.queue(lane).repeaters.lock().push(f),
        }
    }

    /// Run the tasks queued on `lane` at call time, in FIFO order.
    ///
    /// Reentrant: a task may itself drain. Tasks queued while draining wait for the next call.
    pub fn drain_queued(&self, lane: Lane) -> usize {
        let q = self.queue(lane);
        let mut ran = 0;
        for _ in 0..q.rx.len() {
            match q.rx.try_recv() {
                Ok(task) => {
                    self.execute(lane, task);
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// One loop tick: drain queued tasks, then invoke each keep-running closure once.
    ///
    /// Cancellation is checked before every invocation; once cancelled, remaining closures are
    /// dropped without running.
    pub fn tick(&self, lane: Lane) -> TickStats {
        let tasks_run = self.drain_queued(lane);
        let q = self.queue(lane);

        let mut running = std::mem::take(&mut *q.repeaters.lock());
        let mut repeaters_run = 0;
        running.retain_mut(|f| {
            if self.is_cancelled() {
                return false;
            }
            repeaters_run += 1;
            f()
        });

        let mut slot = q.repeaters.lock();
        running.append(&mut *slot);
        *slot = running;
        TickStats {
            tasks_run,
            repeaters_run,
            repeaters_alive: slot.len(),
        }
    }

    /// Block up to `timeout` for a task on `lane`; run it and anything else queued behind it.
    ///
    /// Returns `false` on timeout.
    pub fn wait_for_work(&self, lane: Lane, timeout: Duration) -> bool {
        let q = self.queue(lane);
        let first = if timeout.is_zero() {
            q.rx.try_recv().ok()
        } else {
            match q.rx.recv_timeout(timeout) {
                Ok(task) => Some(task),
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
            }
        };
        let Some(task) = first else {
            return false;
        };
        self.execute(lane, task);
        self.drain_queued(lane);
        true
    }

    /// Drive `lane` until it has no keep-running closure and no queued task.
    ///
    /// Used as the body of a dedicated worker thread.
    pub fn run_lane(&self, lane: Lane, idle: Duration) {
        loop {
            let stats = self.tick(lane);
            if stats.repeaters_alive == 0 {
                if self.pending(lane) == 0 {
                    break;
                }
                self.wait_for_work(lane, idle);
            }
        }
    }

    /// Wake a thread blocked in [`Self::wait_for_work`] on `lane`.
    pub fn wake(&self, lane: Lane) {
        self.post(lane, || {});
    }

    /// Set the one-way cancellation flag and wake both lanes.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            tracing::debug!("coordinator cancelled");
        }
        self.wake(Lane::Host);
        self.wake(Lane::Worker);
    }

    /// `true` once [`Self::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Tasks currently queued on `lane`.
    pub fn pending(&self, lane: Lane) -> usize {
        self.queue(lane).rx.len()
    }

    /// Keep-running closures registered on `lane` (not counting ones mid-tick).
    pub fn repeaters(&self, lane: Lane) -> usize {
        self.queue(lane).repeaters.lock().len()
    }
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("host_pending", &self.pending(Lane::Host))
            .field("worker_pending", &self.pending(Lane::Worker))
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
