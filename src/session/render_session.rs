use crate::dirty::{ChangeKind, DirtyHandle, DirtyNotifier, DirtyRegistry};
use crate::display::{DisplayLink, DisplaySink, update_rect};
use crate::engine::RenderEngine;
use crate::foundation::core::{NodeId, RenderRegion};
use crate::foundation::error::{IprError, IprResult};
use crate::scene::SceneTranslator;
use crate::session::criteria::CompletionCriteria;
use crate::session::opts::{RenderMode, RenderSessionOpts};
use crate::session::state::SessionState;
use crate::session::worker::{
    Boot, Command, EngineLease, SessionStats, SessionStatus, SharedTranslator,
};
use crate::threading::{Coordinator, Lane, ThreadingMode};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// What one [`RenderSession::pump`] did.
#[derive(Clone, Debug, Default)]
pub struct PumpReport {
    /// Host (and, in inline mode, worker) tasks executed.
    pub tasks_run: usize,
    /// Frames handed to the display sink (0 or 1).
    pub frames_delivered: usize,
    /// Engine fault observed for the first time during this pump.
    pub fault: Option<Arc<IprError>>,
}

struct Running {
    coordinator: Coordinator,
    worker: Option<JoinHandle<()>>,
    commands: Sender<Command>,
    exit: Receiver<Box<dyn RenderEngine>>,
    link: DisplayLink,
}

/// Render session orchestrator.
///
/// Owns the engine client while idle and lends it to a worker render loop while running. All
/// methods are called from the host thread; the host must call [`Self::pump`] regularly so worker
/// rendezvous calls and display updates are serviced.
pub struct RenderSession<D: DisplaySink> {
    engine: Option<Box<dyn RenderEngine>>,
    registry: Arc<Mutex<DirtyRegistry>>,
    translator: SharedTranslator,
    display: D,
    opts: RenderSessionOpts,
    status: Arc<SessionStatus>,
    running: Option<Running>,
    frames_delivered: u64,
    fault_reported: bool,
}

impl<D: DisplaySink> RenderSession<D> {
    /// Create an idle session. The translator receives the session's [`DirtyNotifier`].
    pub fn new(
        engine: impl RenderEngine + 'static,
        translator: impl SceneTranslator + 'static,
        display: D,
        opts: RenderSessionOpts,
    ) -> IprResult<Self> {
        opts.validate()?;
        let registry = Arc::new(Mutex::new(DirtyRegistry::new()));
        let mut translator: Box<dyn SceneTranslator> = Box::new(translator);
        translator.attach(DirtyNotifier::new(Arc::clone(&registry)));
        Ok(Self {
            engine: Some(Box::new(engine)),
            registry,
            translator: Arc::new(Mutex::new(translator)),
            display,
            opts,
            status: Arc::new(SessionStatus::default()),
            running: None,
            frames_delivered: 0,
            fault_reported: false,
        })
    }

    /// Start rendering `region` until `criteria` are met.
    ///
    /// Blocks until the worker has created the engine context and pushed the whole scene. On
    /// failure the session stays idle and keeps its engine.
    #[tracing::instrument(level = "info", skip(self))]
    pub fn start(&mut self, region: RenderRegion, criteria: CompletionCriteria) -> IprResult<()> {
        let state = self.state();
        if self.running.is_some() || state != SessionState::Idle {
            return Err(IprError::invalid_state(format!(
                "start requires an idle session, session is {state}"
            )));
        }
        let region = region.validate()?;
        criteria.validate()?;
        if self.opts.mode == RenderMode::Batch && criteria.is_unlimited() {
            return Err(IprError::configuration(
                "a batch render needs at least one completion limit",
            ));
        }

        let coordinator = Coordinator::new();
        coordinator.bind(Lane::Host)?;
        if self.opts.threading == ThreadingMode::Inline {
            coordinator.bind(Lane::Worker)?;
        }
        let engine = self
            .engine
            .take()
            .ok_or_else(|| IprError::invalid_state("engine is not available"))?;

        self.status.reset();
        self.frames_delivered = 0;
        self.fault_reported = false;
        self.status.transition(SessionState::Starting);

        let (cmd_tx, cmd_rx) = unbounded();
        let (exit_tx, exit_rx) = bounded(1);
        let (ready_tx, ready_rx) = bounded::<IprResult<()>>(1);
        let link = DisplayLink::new();
        let boot = Boot {
            lease: EngineLease::new(engine, exit_tx),
            region,
            criteria,
            opts: self.opts.clone(),
            coordinator: coordinator.clone(),
            registry: Arc::clone(&self.registry),
            translator: Arc::clone(&self.translator),
            signal: self.registry.lock().signal().clone(),
            status: Arc::clone(&self.status),
            link: link.clone(),
            commands: cmd_rx,
        };
        let launch = move |c: &Coordinator| match boot.run() {
            Ok(mut lp) => {
                let _ = ready_tx.send(Ok(()));
                c.keep_running(Lane::Worker, move || lp.iterate());
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        };

        let (worker, ready) = match self.opts.threading {
            ThreadingMode::Dedicated => {
                let c = coordinator.clone();
                let idle = Duration::from_millis(self.opts.poll_interval_ms.max(1));
                let spawned = std::thread::Builder::new()
                    .name("ipr-render".to_owned())
                    .spawn(move || {
                        if let Err(e) = c.bind(Lane::Worker) {
                            tracing::error!(error = %e, "render worker could not bind its lane");
                            return;
                        }
                        launch(&c);
                        c.run_lane(Lane::Worker, idle);
                    });
                match spawned {
                    Ok(h) => {
                        let ready = coordinator.await_reply(&ready_rx);
                        (Some(h), ready)
                    }
                    Err(e) => (
                        None,
                        Err(IprError::coordination(format!("spawn render worker: {e}"))),
                    ),
                }
            }
            ThreadingMode::Inline => {
                launch(&coordinator);
                let ready = ready_rx
                    .try_recv()
                    .map_err(|_| IprError::coordination("inline worker did not report start"));
                (None, ready)
            }
        };

        if let Err(e) = ready.and_then(|r| r) {
            if let Some(h) = worker
                && h.join().is_err()
            {
                tracing::warn!("render worker panicked during start");
            }
            self.engine = exit_rx.try_recv().ok();
            if self.engine.is_none() {
                tracing::warn!("engine was not returned after a failed start");
            }
            self.status.transition(SessionState::Idle);
            return Err(e);
        }

        self.running = Some(Running {
            coordinator,
            worker,
            commands: cmd_tx,
            exit: exit_rx,
            link,
        });
        Ok(())
    }

    /// Pause (`true`) or resume (`false`). Blocks until the worker has applied it.
    pub fn pause(&mut self, paused: bool) -> IprResult<()> {
        let state = self.state();
        match (state, paused) {
            (SessionState::Paused, true) | (SessionState::Rendering, false) => Ok(()),
            (SessionState::Rendering | SessionState::Paused, _) => {
                self.command(|ack| Command::Pause(paused, ack))
            }
            _ => Err(IprError::invalid_state(format!(
                "pause needs a rendering or paused session, session is {state}"
            ))),
        }
    }

    /// Reallocate the frame for `region` and restart accumulation.
    pub fn resize(&mut self, region: RenderRegion) -> IprResult<()> {
        let region = region.validate()?;
        self.require_live("resize")?;
        self.command(|ack| Command::Resize(region, ack))
    }

    /// Replace the completion criteria; the progress clock restarts.
    pub fn update_criteria(&mut self, criteria: CompletionCriteria) -> IprResult<()> {
        criteria.validate()?;
        if self.opts.mode == RenderMode::Batch && criteria.is_unlimited() {
            return Err(IprError::configuration(
                "a batch render needs at least one completion limit",
            ));
        }
        self.require_live("update_criteria")?;
        self.command(|ack| Command::UpdateCriteria(criteria, ack))
    }

    fn require_live(&self, op: &str) -> IprResult<()> {
        let state = self.state();
        if matches!(state, SessionState::Rendering | SessionState::Paused) {
            Ok(())
        } else {
            Err(IprError::invalid_state(format!(
                "{op} needs a rendering or paused session, session is {state}"
            )))
        }
    }

    fn command(&self, make: impl FnOnce(Sender<()>) -> Command) -> IprResult<()> {
        let running = self
            .running
            .as_ref()
            .ok_or_else(|| IprError::invalid_state("no render loop is running"))?;
        let (ack_tx, ack_rx) = bounded(1);
        running
            .commands
            .send(make(ack_tx))
            .map_err(|_| self.loop_gone())?;
        running.coordinator.wake(Lane::Worker);

        match self.opts.threading {
            ThreadingMode::Dedicated => running
                .coordinator
                .await_reply(&ack_rx)
                .map_err(|_| self.loop_gone()),
            ThreadingMode::Inline => {
                running.coordinator.tick(Lane::Worker);
                ack_rx.try_recv().map_err(|_| self.loop_gone())
            }
        }
    }

    fn loop_gone(&self) -> IprError {
        match self.last_error() {
            Some(e) => IprError::invalid_state(format!("render loop faulted: {e}")),
            None => IprError::invalid_state("render loop has exited"),
        }
    }

    /// Stop rendering and release the engine context. Idempotent; valid from every state.
    ///
    /// While waiting for the worker the host lane keeps being drained, so a resync rendezvous that
    /// is in flight completes instead of deadlocking.
    #[tracing::instrument(level = "info", skip(self))]
    pub fn stop(&mut self) -> IprResult<()> {
        let Some(mut running) = self.running.take() else {
            if self.state() != SessionState::Idle {
                self.status.transition(SessionState::Exiting);
                self.status.transition(SessionState::Idle);
            }
            return Ok(());
        };

        self.status.transition(SessionState::Exiting);
        running.coordinator.cancel();
        let engine = match self.opts.threading {
            ThreadingMode::Dedicated => running.coordinator.await_reply(&running.exit),
            ThreadingMode::Inline => {
                running.coordinator.tick(Lane::Worker);
                running
                    .exit
                    .try_recv()
                    .map_err(|_| IprError::coordination("inline render loop kept the engine"))
            }
        };
        if let Some(h) = running.worker.take()
            && h.join().is_err()
        {
            tracing::warn!("render worker panicked");
        }
        // A frame published after the stop request is stale.
        if let Some(frame) = running.link.take() {
            tracing::debug!(
                width = frame.width,
                height = frame.height,
                "undelivered frame dropped on stop"
            );
        }

        self.status.transition(SessionState::Idle);
        self.engine = Some(engine?);
        Ok(())
    }

    /// Service the host side: drain the host lane (and tick the worker lane in inline mode),
    /// deliver at most one coalesced frame, reap a worker that finished on its own and report a
    /// newly observed fault.
    pub fn pump(&mut self) -> IprResult<PumpReport> {
        let mut report = PumpReport::default();
        let Some(running) = self.running.as_ref() else {
            return Ok(report);
        };

        report.tasks_run = running.coordinator.drain_queued(Lane::Host);
        if self.opts.threading == ThreadingMode::Inline {
            report.tasks_run += running.coordinator.tick(Lane::Worker).tasks_run;
        }

        // Checked before delivery: a loop that finished has already offered its last frame.
        let finished = running.exit.try_recv().ok();

        if let Some(frame) = running.link.take() {
            let rect = update_rect(&frame, frame.rect);
            self.display.update_region(frame, rect)?;
            self.display.refresh(rect)?;
            self.frames_delivered += 1;
            report.frames_delivered = 1;
        }

        if self.state() == SessionState::Error && !self.fault_reported {
            self.fault_reported = true;
            report.fault = self.last_error();
        }

        if let Some(engine) = finished {
            self.reap(engine);
        }
        Ok(report)
    }

    fn reap(&mut self, engine: Box<dyn RenderEngine>) {
        if let Some(mut running) = self.running.take()
            && let Some(h) = running.worker.take()
            && h.join().is_err()
        {
            tracing::warn!("render worker panicked");
        }
        self.engine = Some(engine);
        // A faulted session stays in Error until stop().
        if self.state() == SessionState::Exiting {
            self.status.transition(SessionState::Idle);
        }
    }

    /// Pump until `done` holds, the loop ends or `timeout` passes. Returns whether `done` held.
    pub fn pump_until(
        &mut self,
        timeout: Duration,
        mut done: impl FnMut(&Self) -> bool,
    ) -> IprResult<bool> {
        let deadline = Instant::now() + timeout;
        let poll = Duration::from_millis(self.opts.poll_interval_ms.max(1));
        loop {
            self.pump()?;
            if done(self) {
                return Ok(true);
            }
            let now = Instant::now();
            if self.running.is_none() || self.state() == SessionState::Error || now >= deadline {
                return Ok(false);
            }
            // Inline, the pump itself renders: only rest while the loop has nothing to do.
            let rest = match self.opts.threading {
                ThreadingMode::Dedicated => true,
                ThreadingMode::Inline => self.status.is_idle(),
            };
            if rest && let Some(r) = self.running.as_ref() {
                r.coordinator
                    .wait_for_work(Lane::Host, (deadline - now).min(poll));
            }
        }
    }

    /// Pump until the loop has ended (batch completion or fault) or `timeout` passes.
    pub fn wait_until_idle(&mut self, timeout: Duration) -> IprResult<SessionState> {
        self.pump_until(timeout, |s| s.running.is_none())?;
        Ok(self.state())
    }

    /// `true` while a render loop holds the engine.
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// `true` after an engine fault, until [`Self::stop`].
    pub fn is_error(&self) -> bool {
        self.state() == SessionState::Error
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.status.state()
    }

    /// Progress percentage in `[0, 100]`.
    pub fn progress(&self) -> u8 {
        self.status.progress()
    }

    /// Fault retained from the last run.
    pub fn last_error(&self) -> Option<Arc<IprError>> {
        self.status.last_error()
    }

    /// Notifier for host change callbacks.
    pub fn notifier(&self) -> DirtyNotifier {
        DirtyNotifier::new(Arc::clone(&self.registry))
    }

    /// Register a node; it is pushed by the next resync pass.
    pub fn register_node(&self, node: NodeId) -> DirtyHandle {
        self.registry.lock().register(node)
    }

    /// Report a change of `node`.
    pub fn mark_dirty(&self, node: NodeId, kind: ChangeKind) -> bool {
        self.registry.lock().mark_dirty(node, kind)
    }

    /// Remove a node; its engine counterpart is released by the next resync pass.
    pub fn unregister_node(&self, node: NodeId) -> bool {
        self.registry.lock().unregister(node)
    }

    /// Display sink.
    pub fn display(&self) -> &D {
        &self.display
    }

    /// Mutable display sink.
    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    /// Options the session was built with.
    pub fn opts(&self) -> &RenderSessionOpts {
        &self.opts
    }

    /// Counter snapshot.
    pub fn stats(&self) -> SessionStats {
        self.status.stats(self.frames_delivered)
    }
}

impl<D: DisplaySink> Drop for RenderSession<D> {
    fn drop(&mut self) {
        if self.running.is_some()
            && let Err(e) = self.stop()
        {
            tracing::warn!(error = %e, "stop on drop failed");
        }
    }
}
