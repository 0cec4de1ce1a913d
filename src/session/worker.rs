use crate::compositor::{AovId, AovPoolOpts, AovPoolStats, AovTile, TileCompositor, decompose_by};
use crate::dirty::{DirtyRegistry, DirtySignal};
use crate::display::DisplayLink;
use crate::engine::{EngineResult, RenderEngine};
use crate::foundation::core::{EngineHandle, RenderRegion};
use crate::foundation::error::{IprError, IprResult};
use crate::scene::{ResyncStats, SceneTranslator, resync_pass};
use crate::session::criteria::{CompletionCriteria, Progress};
use crate::session::opts::{RenderMode, RenderSessionOpts};
use crate::session::state::SessionState;
use crate::threading::{Coordinator, Lane, ThreadingMode};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};

pub(crate) type SharedTranslator = Arc<Mutex<Box<dyn SceneTranslator>>>;

/// Host-to-worker control messages. Each carries an acknowledgement sender.
pub(crate) enum Command {
    Pause(bool, Sender<()>),
    Resize(RenderRegion, Sender<()>),
    UpdateCriteria(CompletionCriteria, Sender<()>),
}

/// Counters of a session, as reported by [`crate::session::RenderSession::stats`].
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct SessionStats {
    /// Lifecycle state at sampling time.
    pub state: SessionState,
    /// Progress percentage.
    pub progress: u8,
    /// Full-frame iterations completed since start.
    pub iterations: u64,
    /// `render_iteration` calls issued (one per tile in tile mode).
    pub render_calls: u64,
    /// Frames composited and offered to the display.
    pub frames_published: u64,
    /// Frames handed to the display sink.
    pub frames_delivered: u64,
    /// Resync counters summed over every pass.
    pub resync: ResyncStats,
    /// AOV pool counters.
    pub pool: AovPoolStats,
    /// `true` once a denoiser failure switched denoising off.
    pub denoise_disabled: bool,
}

/// State shared by the host front and the worker loop.
#[derive(Default)]
pub(crate) struct SessionStatus {
    state: Mutex<SessionState>,
    last_error: Mutex<Option<Arc<IprError>>>,
    progress: AtomicU8,
    iterations: AtomicU64,
    render_calls: AtomicU64,
    frames_published: AtomicU64,
    denoise_disabled: AtomicBool,
    idle: AtomicBool,
    resync: Mutex<ResyncStats>,
    pool: Mutex<AovPoolStats>,
}

impl SessionStatus {
    pub(crate) fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Apply `to` when legal from the current state.
    pub(crate) fn transition(&self, to: SessionState) -> bool {
        let mut state = self.state.lock();
        if !state.can_transition(to) {
            tracing::debug!(from = %*state, %to, "transition ignored");
            return false;
        }
        tracing::info!(from = %*state, %to, "session state");
        *state = to;
        true
    }

    pub(crate) fn fail(&self, err: IprError) {
        tracing::error!(error = %err, "render loop faulted");
        *self.last_error.lock() = Some(Arc::new(err));
        self.transition(SessionState::Error);
    }

    pub(crate) fn last_error(&self) -> Option<Arc<IprError>> {
        self.last_error.lock().clone()
    }

    pub(crate) fn progress(&self) -> u8 {
        self.progress.load(Ordering::Acquire)
    }

    fn set_progress(&self, pct: u8) {
        self.progress.store(pct, Ordering::Release);
    }

    /// Clear counters and the retained error for a new run.
    /// `true` while the loop is paused or has met its completion criteria.
    pub(crate) fn is_idle(&self) -> bool {
        self.idle.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        *self.last_error.lock() = None;
        self.idle.store(false, Ordering::Release);
        self.progress.store(0, Ordering::Release);
        self.iterations.store(0, Ordering::Release);
        self.render_calls.store(0, Ordering::Release);
        self.frames_published.store(0, Ordering::Release);
        self.denoise_disabled.store(false, Ordering::Release);
        *self.resync.lock() = ResyncStats::default();
        *self.pool.lock() = AovPoolStats::default();
    }

    pub(crate) fn stats(&self, frames_delivered: u64) -> SessionStats {
        SessionStats {
            state: self.state(),
            progress: self.progress(),
            iterations: self.iterations.load(Ordering::Acquire),
            render_calls: self.render_calls.load(Ordering::Acquire),
            frames_published: self.frames_published.load(Ordering::Acquire),
            frames_delivered,
            resync: *self.resync.lock(),
            pool: self.pool.lock().clone(),
            denoise_disabled: self.denoise_disabled.load(Ordering::Acquire),
        }
    }
}

/// Exclusive hold on the engine for one session.
///
/// Dropping the lease destroys the context (if one was created) and hands the engine back to the
/// host through the exit channel. Every way out of the worker loop goes through this drop.
pub(crate) struct EngineLease {
    engine: Option<Box<dyn RenderEngine>>,
    handle: Option<EngineHandle>,
    exit: Sender<Box<dyn RenderEngine>>,
}

impl EngineLease {
    pub(crate) fn new(engine: Box<dyn RenderEngine>, exit: Sender<Box<dyn RenderEngine>>) -> Self {
        Self {
            engine: Some(engine),
            handle: None,
            exit,
        }
    }

    fn engine(&mut self) -> IprResult<&mut (dyn RenderEngine + 'static)> {
        match self.engine.as_deref_mut() {
            Some(e) => Ok(e),
            None => Err(IprError::coordination("engine lease already released")),
        }
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        let Some(mut engine) = self.engine.take() else {
            return;
        };
        if let Some(handle) = self.handle.take() {
            match engine.destroy_context(handle) {
                Ok(()) => tracing::debug!(?handle, "engine context destroyed"),
                Err(e) => tracing::warn!(?handle, error = %e, "destroying engine context failed"),
            }
        }
        if self.exit.send(engine).is_err() {
            tracing::warn!("session dropped before the engine was returned");
        }
    }
}

/// Everything the worker needs to bring a render loop up.
pub(crate) struct Boot {
    pub(crate) lease: EngineLease,
    pub(crate) region: RenderRegion,
    pub(crate) criteria: CompletionCriteria,
    pub(crate) opts: RenderSessionOpts,
    pub(crate) coordinator: Coordinator,
    pub(crate) registry: Arc<Mutex<DirtyRegistry>>,
    pub(crate) translator: SharedTranslator,
    pub(crate) signal: DirtySignal,
    pub(crate) status: Arc<SessionStatus>,
    pub(crate) link: DisplayLink,
    pub(crate) commands: Receiver<Command>,
}

impl Boot {
    /// Create the context, push the whole scene and allocate the frame. Runs on the worker lane.
    #[tracing::instrument(level = "debug", skip_all, fields(region = %self.region))]
    pub(crate) fn run(self) -> IprResult<RenderLoop> {
        let Boot {
            mut lease,
            region,
            criteria,
            opts,
            coordinator,
            registry,
            translator,
            signal,
            status,
            link,
            commands,
        } = self;

        let handle = lease.engine()?.create_context(region)?;
        lease.handle = Some(handle);
        tracing::debug!(?handle, "engine context created");

        let compositor = TileCompositor::new(AovPoolOpts {
            max_pool_bytes: opts.aov_pool_budget_bytes,
            ..AovPoolOpts::default()
        });
        let mut lp = RenderLoop {
            lease,
            handle,
            compositor,
            coordinator,
            registry,
            translator,
            signal,
            status,
            link,
            commands,
            opts,
            region,
            criteria,
            seen_epoch: 0,
            resync_due: false,
            iterations: 0,
            started_at: Instant::now(),
            paused_at: None,
            last_publish: None,
            variance: None,
            complete: false,
        };
        lp.resync(true)?;
        lp.compositor.begin_frame(region, &lp.opts.aovs)?;
        lp.restart();
        lp.status.transition(SessionState::Rendering);
        Ok(lp)
    }
}

/// Worker-side render loop, driven as a keep-running closure on [`Lane::Worker`].
pub(crate) struct RenderLoop {
    lease: EngineLease,
    handle: EngineHandle,
    compositor: TileCompositor,
    coordinator: Coordinator,
    registry: Arc<Mutex<DirtyRegistry>>,
    translator: SharedTranslator,
    signal: DirtySignal,
    status: Arc<SessionStatus>,
    link: DisplayLink,
    commands: Receiver<Command>,
    opts: RenderSessionOpts,
    region: RenderRegion,
    criteria: CompletionCriteria,
    seen_epoch: u64,
    resync_due: bool,
    iterations: u32,
    started_at: Instant,
    paused_at: Option<Instant>,
    last_publish: Option<Instant>,
    variance: Option<f32>,
    complete: bool,
}

impl RenderLoop {
    /// One loop iteration. Returns `false` when the loop is done; faults are recorded first.
    pub(crate) fn iterate(&mut self) -> bool {
        match self.step() {
            Ok(go) => go,
            Err(e) => {
                self.status.fail(e);
                false
            }
        }
    }

    fn step(&mut self) -> IprResult<bool> {
        self.apply_commands()?;
        if self.coordinator.is_cancelled() {
            return Ok(false);
        }
        if self.paused_at.is_some() {
            self.idle();
            return Ok(true);
        }

        let changed = self.signal.epoch() != self.seen_epoch;
        if self.resync_due || (changed && self.opts.mode == RenderMode::Interactive) {
            self.resync(false)?;
        }
        if self.complete {
            self.idle();
            return Ok(true);
        }

        self.status.idle.store(false, Ordering::Release);
        if !self.render_pass()? {
            return Ok(false);
        }

        let p = self.progress(0.0);
        self.status.set_progress(self.criteria.progress(&p));
        if !self.criteria.is_complete(&p) {
            self.publish(false)?;
            return Ok(true);
        }

        self.publish(true)?;
        if self.opts.mode == RenderMode::Batch {
            tracing::info!(iterations = self.iterations, "batch render complete");
            self.status.transition(SessionState::Exiting);
            return Ok(false);
        }
        tracing::debug!(iterations = self.iterations, "completion criteria met, idling");
        self.complete = true;
        Ok(true)
    }

    fn idle(&self) {
        self.status.idle.store(true, Ordering::Release);
        if self.opts.threading == ThreadingMode::Dedicated {
            let poll = Duration::from_millis(self.opts.poll_interval_ms.max(1));
            self.coordinator.wait_for_work(Lane::Worker, poll);
        }
    }

    fn progress(&self, tile_fraction: f64) -> Progress {
        let elapsed = match self.paused_at {
            Some(p) => p.duration_since(self.started_at),
            None => self.started_at.elapsed(),
        };
        Progress {
            iterations: self.iterations,
            tile_fraction,
            elapsed,
            variance: self.variance,
        }
    }

    /// Restart accumulation and the progress clock.
    fn restart(&mut self) {
        self.iterations = 0;
        self.variance = None;
        self.started_at = Instant::now();
        self.last_publish = None;
        self.complete = false;
        self.status.set_progress(0);
    }

    fn apply_commands(&mut self) -> IprResult<()> {
        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                Command::Pause(paused, ack) => {
                    self.set_paused(paused);
                    let _ = ack.send(());
                }
                Command::Resize(region, ack) => {
                    self.resize(region)?;
                    let _ = ack.send(());
                }
                Command::UpdateCriteria(criteria, ack) => {
                    tracing::debug!(?criteria, "criteria updated");
                    self.criteria = criteria;
                    self.started_at = Instant::now();
                    self.complete = false;
                    let _ = ack.send(());
                }
            }
        }
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) {
        match (paused, self.paused_at) {
            (true, None) => {
                self.paused_at = Some(Instant::now());
                self.status.transition(SessionState::Paused);
            }
            (false, Some(at)) => {
                // Paused time does not count against a time limit.
                self.started_at += at.elapsed();
                self.paused_at = None;
                self.status.transition(SessionState::Rendering);
            }
            _ => {}
        }
    }

    fn resize(&mut self, region: RenderRegion) -> IprResult<()> {
        tracing::info!(from = %self.region, to = %region, "resize");
        let handle = self.handle;
        let engine = self.lease.engine()?;
        engine.resize_context(handle, region)?;
        engine.invalidate(handle)?;
        self.compositor.begin_frame(region, &self.opts.aovs)?;
        self.region = region;
        self.resync_due = true;
        self.restart();
        Ok(())
    }

    /// Rendezvous on the host lane and run a resync pass there.
    ///
    /// `fresh` forgets every committed hash first, as for a new context.
    fn resync(&mut self, fresh: bool) -> IprResult<()> {
        let registry = Arc::clone(&self.registry);
        let translator = Arc::clone(&self.translator);
        let coordinator = self.coordinator.clone();
        let handle = self.handle;

        let (result, epoch) = self.coordinator.run_on_host_and_wait(move || {
            let mut registry = registry.lock();
            if fresh {
                registry.reset_sync_state();
            }
            let mut translator = translator.lock();
            let result = resync_pass(&mut registry, &mut **translator, handle, &|| {
                coordinator.is_cancelled()
            });
            (result, registry.signal().epoch())
        })?;
        let stats = result?;

        self.seen_epoch = epoch;
        self.resync_due = false;
        self.status.resync.lock().absorb(stats);
        if stats.touched_engine() && !fresh {
            self.lease.engine()?.invalidate(handle)?;
            self.restart();
        }
        Ok(())
    }

    /// Render one full-frame iteration. Returns `false` when cancelled between tiles.
    fn render_pass(&mut self) -> IprResult<bool> {
        let aovs = self.compositor.active_aovs();
        let mut variance = None;

        match self.opts.tile_size {
            Some(size) => {
                let tiles = decompose_by(self.region, size);
                let total = tiles.total();
                for (done, tile) in tiles.enumerate() {
                    if self.coordinator.is_cancelled() {
                        return Ok(false);
                    }
                    let v = self.render_tile(tile, &aovs)?;
                    variance = variance.into_iter().chain(v).reduce(f32::max);

                    let finished = done as u64 + 1;
                    if finished < total {
                        let p = self.progress(finished as f64 / total as f64);
                        self.status.set_progress(self.criteria.progress(&p));
                    }
                }
            }
            None => variance = self.render_tile(self.region, &aovs)?,
        }

        self.iterations = self.iterations.saturating_add(1);
        self.variance = variance;
        self.status.iterations.fetch_add(1, Ordering::AcqRel);
        *self.status.pool.lock() = self.compositor.pool_stats();
        tracing::debug!(iteration = self.iterations, ?variance, "iteration rendered");
        Ok(true)
    }

    fn render_tile(&mut self, tile: RenderRegion, aovs: &[AovId]) -> IprResult<Option<f32>> {
        let handle = self.handle;
        let engine = self.lease.engine()?;
        engine.set_region(handle, tile)?;
        let report = engine.render_iteration(handle)?;
        self.status.render_calls.fetch_add(1, Ordering::AcqRel);

        let passes = aovs
            .iter()
            .map(|&aov| {
                Ok(AovTile {
                    aov,
                    pixels: engine.read_aov(handle, aov, tile)?,
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;
        self.compositor.accumulate_tile(tile, &passes)?;
        Ok(report.variance)
    }

    /// Composite and offer a frame, unless the display interval has not elapsed.
    fn publish(&mut self, force: bool) -> IprResult<()> {
        let interval = Duration::from_millis(self.opts.display_interval_ms);
        if !force && self.last_publish.is_some_and(|t| t.elapsed() < interval) {
            return Ok(());
        }

        let handle = self.handle;
        let engine = self.lease.engine()?;
        let shadow = engine.shadow_catcher(handle);
        let frame = self
            .compositor
            .composite(&self.opts.composite, shadow.as_ref(), engine)?;

        self.status
            .denoise_disabled
            .store(self.compositor.denoise_disabled(), Ordering::Release);
        let fresh_slot = self.link.offer(frame);
        self.status.frames_published.fetch_add(1, Ordering::AcqRel);
        if fresh_slot {
            self.coordinator.wake(Lane::Host);
        }
        self.last_publish = Some(Instant::now());
        Ok(())
    }
}
