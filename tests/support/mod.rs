#![allow(dead_code)]

use ipr::{
    AovBuffer, AovId, ChangeKind, ContentHash, DirtyNotifier, EngineError, EngineHandle,
    EngineResult, ImageFilters, IterationReport, NodeId, RenderEngine, RenderRegion, RgbaF32,
    SceneTranslator,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Counters shared between a test and the engine it moved into a session.
#[derive(Clone, Default)]
pub struct Counters {
    pub created: Arc<AtomicUsize>,
    pub destroyed: Arc<AtomicUsize>,
    pub renders: Arc<AtomicUsize>,
    pub invalidations: Arc<AtomicUsize>,
    pub resizes: Arc<AtomicUsize>,
    pub denoises: Arc<AtomicUsize>,
}

impl Counters {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub fn resizes(&self) -> usize {
        self.resizes.load(Ordering::SeqCst)
    }
}

/// Flat-color engine counting every call.
#[derive(Default)]
pub struct CountingEngine {
    pub counters: Counters,
    pub fail_create: bool,
    pub fail_render_at: Option<usize>,
    pub fail_denoise: bool,
    pub delay: Duration,
    next: u64,
    contexts: HashMap<EngineHandle, RenderRegion>,
}

impl CountingEngine {
    pub fn new() -> (Self, Counters) {
        let e = Self::default();
        let c = e.counters.clone();
        (e, c)
    }

    fn check(&self, handle: EngineHandle) -> EngineResult<()> {
        if self.contexts.contains_key(&handle) {
            Ok(())
        } else {
            Err(EngineError::UnknownHandle(handle))
        }
    }
}

pub const COLOR: RgbaF32 = [0.5, 0.25, 0.125, 1.0];

impl ImageFilters for CountingEngine {
    fn tonemap(&mut self, color: AovBuffer) -> EngineResult<AovBuffer> {
        Ok(color)
    }

    fn denoise(&mut self, color: AovBuffer) -> EngineResult<AovBuffer> {
        self.counters.denoises.fetch_add(1, Ordering::SeqCst);
        if self.fail_denoise {
            return Err(EngineError::PostProcess("denoiser unavailable".to_owned()));
        }
        Ok(color)
    }
}

impl RenderEngine for CountingEngine {
    fn create_context(&mut self, region: RenderRegion) -> EngineResult<EngineHandle> {
        if self.fail_create {
            return Err(EngineError::ContextCreation("no device".to_owned()));
        }
        self.next += 1;
        let h = EngineHandle(self.next);
        self.contexts.insert(h, region);
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(h)
    }

    fn resize_context(&mut self, handle: EngineHandle, frame: RenderRegion) -> EngineResult<()> {
        self.check(handle)?;
        self.contexts.insert(handle, frame);
        self.counters.resizes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn set_region(&mut self, handle: EngineHandle, region: RenderRegion) -> EngineResult<()> {
        match self.contexts.get(&handle) {
            None => Err(EngineError::UnknownHandle(handle)),
            Some(frame) if frame.contains(region) => Ok(()),
            Some(frame) => Err(EngineError::Iteration(format!(
                "region {region} outside frame {frame}"
            ))),
        }
    }

    fn invalidate(&mut self, handle: EngineHandle) -> EngineResult<()> {
        self.check(handle)?;
        self.counters.invalidations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn render_iteration(&mut self, handle: EngineHandle) -> EngineResult<IterationReport> {
        self.check(handle)?;
        let n = self.counters.renders.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_render_at == Some(n) {
            return Err(EngineError::Iteration("device lost".to_owned()));
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(IterationReport {
            samples: n as u32,
            variance: Some(1.0 / n as f32),
        })
    }

    fn read_aov(
        &mut self,
        handle: EngineHandle,
        aov: AovId,
        tile: RenderRegion,
    ) -> EngineResult<Vec<RgbaF32>> {
        self.check(handle)?;
        let px = match aov {
            AovId::Color => COLOR,
            AovId::Opacity => [1.0; 4],
            _ => [0.0; 4],
        };
        Ok(vec![px; tile.area() as usize])
    }

    fn destroy_context(&mut self, handle: EngineHandle) -> EngineResult<()> {
        self.check(handle)?;
        self.contexts.remove(&handle);
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Translator over a map of node values; the hash is the value's hash.
#[derive(Clone, Default)]
pub struct ScriptedTranslator {
    pub values: Arc<Mutex<BTreeMap<NodeId, u64>>>,
    pub resynced: Arc<Mutex<Vec<NodeId>>>,
    pub forgotten: Arc<Mutex<Vec<NodeId>>>,
    pub notifier: Arc<Mutex<Option<DirtyNotifier>>>,
}

impl ScriptedTranslator {
    pub fn with_nodes(n: u64) -> Self {
        let t = Self::default();
        {
            let mut v = t.values.lock();
            for i in 0..n {
                v.insert(NodeId(i), i);
            }
        }
        t
    }

    pub fn set(&self, node: NodeId, value: u64) {
        self.values.lock().insert(node, value);
    }

    pub fn resync_count(&self) -> usize {
        self.resynced.lock().len()
    }
}

impl SceneTranslator for ScriptedTranslator {
    fn content_hash(&self, node: NodeId) -> Option<ContentHash> {
        self.values
            .lock()
            .get(&node)
            .map(|v| ContentHash::SEED.combine(v))
    }

    fn resync(
        &mut self,
        node: NodeId,
        _changes: ChangeKind,
        _engine: EngineHandle,
    ) -> EngineResult<()> {
        self.resynced.lock().push(node);
        Ok(())
    }

    fn forget(&mut self, node: NodeId, _engine: EngineHandle) -> EngineResult<()> {
        self.forgotten.lock().push(node);
        Ok(())
    }

    fn attach(&mut self, notifier: DirtyNotifier) {
        *self.notifier.lock() = Some(notifier);
    }
}

pub fn region(w: u32, h: u32) -> RenderRegion {
    RenderRegion::full(w, h).unwrap()
}
