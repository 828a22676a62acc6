//! Realtime access to a processing instance.
//!
//! Control threads install and remove the [`ProcessEngine`] behind a mutex that the
//! audio thread only ever `try_lock`s, so a block call never waits on control code.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::metadata::PluginId;
use crate::params::{ParamChange, ParamQueue};
use crate::processing::{ProcessEngine, ProcessOutcome};

pub(crate) struct RealtimeSlot {
    ready: AtomicBool,
    engine: Mutex<Option<ProcessEngine>>,
    edits: Arc<ParamQueue>,
}

impl RealtimeSlot {
    pub(crate) fn new(edits: Arc<ParamQueue>) -> Self {
        Self {
            ready: AtomicBool::new(false),
            engine: Mutex::new(None),
            edits,
        }
    }

    pub(crate) fn install(&self, engine: ProcessEngine) {
        let mut slot = self.engine.lock();
        while self.edits.pop().is_some() {}
        *slot = Some(engine);
        drop(slot);
        self.ready.store(true, Ordering::Release);
    }

    /// Waits out an in-flight block, then hands the engine back for teardown.
    pub(crate) fn take(&self) -> Option<ProcessEngine> {
        self.ready.store(false, Ordering::Release);
        let engine = self.engine.lock().take();
        // Changes queued for this cycle must not leak into the next one.
        while self.edits.pop().is_some() {}
        engine
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Oldest change is dropped when the queue is full.
    pub(crate) fn queue(&self, change: ParamChange) {
        if self.is_ready() {
            self.edits.force_push(change);
        }
    }
}

/// Cheap, cloneable handle for the audio thread.
///
/// Resolves the instance once; afterwards every block goes straight to the engine.
/// Unloading the instance turns the handle inert (`NotReady`).
#[derive(Clone)]
pub struct ProcessorHandle {
    id: PluginId,
    slot: Arc<RealtimeSlot>,
}

impl ProcessorHandle {
    pub(crate) fn new(id: PluginId, slot: Arc<RealtimeSlot>) -> Self {
        Self { id, slot }
    }

    pub fn id(&self) -> &PluginId {
        &self.id
    }

    pub fn is_ready(&self) -> bool {
        self.slot.is_ready()
    }

    /// Process one block. Never blocks, allocates or unwinds.
    pub fn process_block(
        &self,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        num_samples: usize,
    ) -> ProcessOutcome {
        if !self.slot.is_ready() {
            return ProcessOutcome::NotReady;
        }
        let Some(mut guard) = self.slot.engine.try_lock() else {
            return ProcessOutcome::Busy;
        };
        match guard.as_mut() {
            Some(engine) => engine.process(&self.slot.edits, inputs, outputs, num_samples),
            None => ProcessOutcome::NotReady,
        }
    }
}

impl std::fmt::Debug for ProcessorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorHandle")
            .field("id", &self.id)
            .field("ready", &self.is_ready())
            .finish()
    }
}
