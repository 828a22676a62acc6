//! Registry of loaded instances.
//!
//! Control operations take one coarse mutex around lookup and lifecycle changes.
//! The audio path never touches it: processor handles are published in an
//! `ArcSwap` snapshot that block calls read without locking.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::error::{HostError, Result};
use crate::handle::ProcessorHandle;
use crate::instance::PluginInstance;
use crate::metadata::{PluginId, PluginInfo};
use crate::module::{PluginModule, ResidencyTracker};
use crate::window::{ViewSize, WindowSystem};

/// Engine settings shared by every instance of a registry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    pub host_name: String,
    pub id_prefix: String,
    pub default_editor_size: ViewSize,
    pub parameter_queue_capacity: usize,
    pub max_parameter_changes_per_block: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            host_name: "plughost".to_string(),
            id_prefix: "vst3_plugin".to_string(),
            default_editor_size: ViewSize::default(),
            parameter_queue_capacity: 256,
            max_parameter_changes_per_block: 64,
        }
    }
}

struct Entry {
    /// Load sequence number, used for reverse-order teardown.
    seq: u64,
    instance: PluginInstance,
}

struct RegistryInner {
    entries: HashMap<PluginId, Entry>,
    windows: Box<dyn WindowSystem>,
}

type ProcessorTable = HashMap<PluginId, ProcessorHandle>;

pub struct Registry {
    config: RegistryConfig,
    inner: Mutex<RegistryInner>,
    processors: ArcSwap<ProcessorTable>,
    next_id: AtomicU64,
    residency: ResidencyTracker,
}

impl Registry {
    pub fn new(config: RegistryConfig, windows: Box<dyn WindowSystem>) -> Self {
        Self {
            config,
            inner: Mutex::new(RegistryInner {
                entries: HashMap::new(),
                windows,
            }),
            processors: ArcSwap::from_pointee(HashMap::new()),
            next_id: AtomicU64::new(1),
            residency: ResidencyTracker::new(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Modules loaded through this registry that are still mapped.
    pub fn resident_modules(&self) -> usize {
        self.residency.resident()
    }

    fn allocate(&self) -> (PluginId, u64) {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed);
        (PluginId::new(format!("{}_{seq}", self.config.id_prefix)), seq)
    }

    /// Load the binary at `path` and register a new instance of its audio class.
    pub fn load(&self, path: &Path) -> Result<PluginInfo> {
        let module = PluginModule::load(path)?;
        self.insert(module)
    }

    /// Register an instance from an already-resident module.
    pub fn insert(&self, module: PluginModule) -> Result<PluginInfo> {
        let module = module.track(&self.residency);
        let (id, seq) = self.allocate();
        let instance = PluginInstance::create(id.clone(), module, &self.config).inspect_err(|e| {
            tracing::warn!("Failed to load plugin {id}: {e}");
        })?;
        let info = instance.info().clone();

        let mut inner = self.inner.lock();
        inner.entries.insert(id.clone(), Entry { seq, instance });
        drop(inner);
        Ok(info)
    }

    /// Tear down and release an instance. False for unknown ids.
    pub fn remove(&self, id: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(mut entry) = inner.entries.remove(id) else {
            return false;
        };
        self.unpublish(id);
        entry.instance.shutdown(inner.windows.as_mut());
        drop(inner);

        drop(entry);
        tracing::info!("Unloaded plugin {id}");
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every instance, in load order.
    pub fn list(&self) -> Vec<PluginInfo> {
        let inner = self.inner.lock();
        let mut entries: Vec<&Entry> = inner.entries.values().collect();
        entries.sort_by_key(|entry| entry.seq);
        entries
            .into_iter()
            .map(|entry| entry.instance.info().clone())
            .collect()
    }

    pub fn info(&self, id: &str) -> Option<PluginInfo> {
        self.with_instance(id, |instance| instance.info().clone()).ok()
    }

    pub fn with_instance<R>(&self, id: &str, f: impl FnOnce(&PluginInstance) -> R) -> Result<R> {
        let inner = self.inner.lock();
        inner
            .entries
            .get(id)
            .map(|entry| f(&entry.instance))
            .ok_or_else(|| HostError::NotFound(PluginId::from(id)))
    }

    /// Run `f` with the instance and the window system, under the registry lock.
    pub fn with_instance_mut<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut PluginInstance, &mut dyn WindowSystem) -> R,
    ) -> Result<R> {
        let mut inner = self.inner.lock();
        let RegistryInner { entries, windows } = &mut *inner;
        entries
            .get_mut(id)
            .map(|entry| f(&mut entry.instance, windows.as_mut()))
            .ok_or_else(|| HostError::NotFound(PluginId::from(id)))
    }

    pub fn setup_processing(
        &self,
        id: &str,
        sample_rate: f64,
        max_block_size: usize,
        channels: crate::processing::ChannelLayout,
    ) -> Result<()> {
        let max_changes = self.config.max_parameter_changes_per_block;
        // The processor table only changes while the registry lock is held.
        self.with_instance_mut(id, |instance, _| -> Result<()> {
            instance.setup_processing(sample_rate, max_block_size, channels, max_changes)?;
            self.publish(instance.processor());
            Ok(())
        })?
    }

    pub fn stop_processing(&self, id: &str) -> Result<()> {
        self.with_instance_mut(id, |instance, _| -> Result<()> {
            instance.stop_processing()?;
            self.unpublish(id);
            Ok(())
        })?
    }

    /// Lock-free lookup for the audio thread.
    pub fn processor(&self, id: &str) -> Option<ProcessorHandle> {
        self.processors.load().get(id).cloned()
    }

    /// Lock-free; usable from the audio thread without cloning the handle.
    pub fn with_processor<R>(&self, id: &str, f: impl FnOnce(Option<&ProcessorHandle>) -> R) -> R {
        let table = self.processors.load();
        f(table.get(id))
    }

    fn publish(&self, handle: ProcessorHandle) {
        self.processors.rcu(|table| {
            let mut table = ProcessorTable::clone(table);
            table.insert(handle.id().clone(), handle.clone());
            table
        });
    }

    fn unpublish(&self, id: &str) {
        self.processors.rcu(|table| {
            let mut table = ProcessorTable::clone(table);
            table.remove(id);
            table
        });
    }

    pub fn pump_windows(&self) {
        self.inner.lock().windows.pump();
    }

    /// Unload everything, most recently loaded first.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let mut entries: Vec<(PluginId, Entry)> = inner.entries.drain().collect();
        entries.sort_by_key(|(_, entry)| std::cmp::Reverse(entry.seq));
        self.processors.store(Arc::new(HashMap::new()));
        for (id, mut entry) in entries {
            entry.instance.shutdown(inner.windows.as_mut());
            drop(entry);
            tracing::info!("Unloaded plugin {id}");
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.clear();
    }
}
