//! `PluginHost`: the host-side API over the plugin registry.

use std::path::Path;

use crossbeam_channel::{Receiver, Sender};
use plughost_vst3::{
    ChannelLayout, ParameterInfo, PluginInfo, PluginModule, ProcessOutcome, ProcessorHandle,
    Registry, WindowEvent, WindowHandle, WindowSystem,
};

use crate::{HostConfig, PluginHostBuilder, Result};

/// Hosts any number of VST3 plugin instances.
///
/// Control methods (`load_plugin`, `set_parameter`, `show_ui`, ...) may be called from
/// any thread and serialize on the registry. `process_block` and [`ProcessorHandle`]
/// never touch that lock.
///
/// # Example
///
/// ```ignore
/// use plughost::prelude::*;
///
/// let host = PluginHost::new();
/// let info = host.load_plugin("/Library/Audio/Plug-Ins/VST3/Reverb.vst3")?;
/// host.setup_processing(&info.id, 48000.0, 256, ChannelLayout::stereo())?;
///
/// let processor = host.processor(&info.id).unwrap();
/// // audio thread:
/// processor.process_block(&[&left_in, &right_in], &mut [&mut left_out, &mut right_out], 256);
/// ```
pub struct PluginHost {
    config: HostConfig,
    registry: Registry,
    events_tx: Sender<WindowEvent>,
    events_rx: Receiver<WindowEvent>,
}

impl PluginHost {
    pub fn builder() -> PluginHostBuilder {
        PluginHostBuilder::default()
    }

    /// Host with default config and the native window system.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub(crate) fn from_parts(
        config: HostConfig,
        windows: Box<dyn WindowSystem>,
        events_tx: Sender<WindowEvent>,
        events_rx: Receiver<WindowEvent>,
    ) -> Self {
        let registry = Registry::new(config.registry_config(), windows);
        Self {
            config,
            registry,
            events_tx,
            events_rx,
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Load a module (shared library or `.vst3` bundle) and register a new instance.
    /// Every load gets a fresh id, even for the same path.
    pub fn load_plugin(&self, path: impl AsRef<Path>) -> Result<PluginInfo> {
        Ok(self.registry.load(path.as_ref())?)
    }

    /// Register an instance from a module whose factory is already resident.
    pub fn load_module(&self, module: PluginModule) -> Result<PluginInfo> {
        Ok(self.registry.insert(module)?)
    }

    /// False for unknown ids.
    pub fn unload_plugin(&self, id: impl AsRef<str>) -> bool {
        self.registry.remove(id.as_ref())
    }

    /// Snapshot of every loaded instance, in load order.
    pub fn list_loaded(&self) -> Vec<PluginInfo> {
        self.registry.list()
    }

    pub fn plugin_info(&self, id: impl AsRef<str>) -> Option<PluginInfo> {
        self.registry.info(id.as_ref())
    }

    /// Modules loaded by this host that are still mapped.
    pub fn resident_modules(&self) -> usize {
        self.registry.resident_modules()
    }

    // ------------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------------

    /// Loaded -> ProcessingReady.
    pub fn setup_processing(
        &self,
        id: impl AsRef<str>,
        sample_rate: f64,
        max_block_size: usize,
        channels: ChannelLayout,
    ) -> Result<()> {
        Ok(self
            .registry
            .setup_processing(id.as_ref(), sample_rate, max_block_size, channels)?)
    }

    /// ProcessingReady -> Loaded.
    pub fn stop_processing(&self, id: impl AsRef<str>) -> Result<()> {
        Ok(self.registry.stop_processing(id.as_ref())?)
    }

    /// Realtime-safe handle; prefer this over [`PluginHost::process_block`] on the audio thread.
    pub fn processor(&self, id: impl AsRef<str>) -> Option<ProcessorHandle> {
        self.registry.processor(id.as_ref())
    }

    /// Process one block for `id`. `NotReady` unless the instance is processing.
    pub fn process_block(
        &self,
        id: impl AsRef<str>,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        num_samples: usize,
    ) -> ProcessOutcome {
        self.registry.with_processor(id.as_ref(), |handle| match handle {
            Some(handle) => handle.process_block(inputs, outputs, num_samples),
            None => ProcessOutcome::NotReady,
        })
    }

    // ------------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------------

    /// Forwards the normalized value unclamped. False without a controller.
    pub fn set_parameter(&self, id: impl AsRef<str>, param_id: u32, value: f64) -> bool {
        self.registry
            .with_instance(id.as_ref(), |instance| instance.set_parameter(param_id, value))
            .unwrap_or(false)
    }

    /// 0.0 for unknown plugins, missing controllers and undeclared parameters.
    pub fn get_parameter(&self, id: impl AsRef<str>, param_id: u32) -> f64 {
        self.registry
            .with_instance(id.as_ref(), |instance| instance.get_parameter(param_id))
            .unwrap_or(0.0)
    }

    pub fn parameter_count(&self, id: impl AsRef<str>) -> usize {
        self.registry
            .with_instance(id.as_ref(), |instance| instance.parameter_count())
            .unwrap_or(0)
    }

    pub fn parameters(&self, id: impl AsRef<str>) -> Vec<ParameterInfo> {
        self.registry
            .with_instance(id.as_ref(), |instance| instance.parameters().to_vec())
            .unwrap_or_default()
    }

    /// Plugin-formatted text for a normalized value (e.g. "-6.0 dB").
    pub fn parameter_display(&self, id: impl AsRef<str>, param_id: u32, value: f64) -> Option<String> {
        self.registry
            .with_instance(id.as_ref(), |instance| instance.parameter_display(param_id, value))
            .ok()
            .flatten()
    }

    // ------------------------------------------------------------------------
    // Editor
    // ------------------------------------------------------------------------

    /// Open the plugin editor, embedded into `parent` or in a host-owned window.
    pub fn show_ui(&self, id: impl AsRef<str>, parent: Option<WindowHandle>) -> bool {
        let config = self.registry.config();
        self.registry
            .with_instance_mut(id.as_ref(), |instance, windows| {
                instance.show_ui(parent, config, windows)
            })
            .unwrap_or(false)
    }

    /// Always leaves the editor hidden. False only for unknown ids.
    pub fn hide_ui(&self, id: impl AsRef<str>) -> bool {
        self.registry
            .with_instance_mut(id.as_ref(), |instance, windows| instance.hide_ui(windows))
            .unwrap_or(false)
    }

    /// Pump native window messages and close editors the user asked to close.
    /// Call regularly from the thread that opened the editors.
    pub fn process_window_events(&self) -> usize {
        self.registry.pump_windows();
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                WindowEvent::CloseRequested(id) => {
                    tracing::debug!("Editor window of {id} closed by user");
                    if self.hide_ui(&id) {
                        handled += 1;
                    }
                }
            }
        }
        handled
    }

    /// Channel for custom window systems to report close requests.
    pub fn window_event_sender(&self) -> Sender<WindowEvent> {
        self.events_tx.clone()
    }
}

impl Default for PluginHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        let loaded = self.registry.len();
        if loaded > 0 {
            tracing::info!("Shutting down host with {loaded} loaded plugins");
        }
        self.registry.clear();
    }
}
