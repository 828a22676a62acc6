//! Builder for configuring and constructing a `PluginHost`.

use crossbeam_channel::unbounded;
use plughost_vst3::{native_window_system, ViewSize, WindowSystem};

use crate::{HostConfig, PluginHost};

/// Without an explicit window system the platform's native one is used; on
/// platforms without one, editors can only be embedded into caller windows.
///
/// # Example
///
/// ```ignore
/// use plughost::prelude::*;
///
/// let host = PluginHost::builder()
///     .host_name("My DAW")
///     .default_editor_size(1024, 768)
///     .build();
/// ```
#[derive(Default)]
pub struct PluginHostBuilder {
    config: HostConfig,
    window_system: Option<Box<dyn WindowSystem>>,
}

impl PluginHostBuilder {
    /// Replaces every setting made so far.
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host_name(mut self, name: impl Into<String>) -> Self {
        self.config.host_name = name.into();
        self
    }

    /// Default: "vst3_plugin"
    pub fn id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.id_prefix = prefix.into();
        self
    }

    /// Default: 800x600
    pub fn default_editor_size(mut self, width: u32, height: u32) -> Self {
        self.config.default_editor_size = ViewSize::new(width, height);
        self
    }

    /// Default: 256
    pub fn parameter_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.parameter_queue_capacity = capacity;
        self
    }

    /// Default: 64
    pub fn max_parameter_changes_per_block(mut self, count: usize) -> Self {
        self.config.max_parameter_changes_per_block = count;
        self
    }

    /// Window system for editors opened without a parent window.
    /// Custom systems report close requests through [`PluginHost::window_event_sender`].
    pub fn window_system(mut self, windows: Box<dyn WindowSystem>) -> Self {
        self.window_system = Some(windows);
        self
    }

    pub fn build(self) -> PluginHost {
        let (events_tx, events_rx) = unbounded();
        let windows = self
            .window_system
            .unwrap_or_else(|| native_window_system(events_tx.clone()));
        PluginHost::from_parts(self.config, windows, events_tx, events_rx)
    }
}
