//! A loaded plugin: module, component, optional controller, editor and processing state.
//!
//! Field order is teardown order. The editor and the realtime engine go first, then the
//! controller, the component, the host objects and finally the module that owns the code
//! all of them point into.

use std::path::Path;
use std::sync::Arc;

use crate::component::{Component, Controller};
use crate::editor::{window_title, EditorRequest, EditorSession};
use crate::error::{HostError, Result};
use crate::factory::{ClassCategory, PluginFactory};
use crate::handle::{ProcessorHandle, RealtimeSlot};
use crate::host_context::HostContext;
use crate::metadata::{AudioIO, ParameterInfo, PluginId, PluginInfo};
use crate::module::PluginModule;
use crate::params::{ParamChange, ParamQueue};
use crate::processing::{ChannelLayout, ProcessEngine, ProcessingContext, ProcessingState};
use crate::registry::RegistryConfig;
use crate::window::{WindowHandle, WindowSystem};

use vst3::Steinberg::Vst::BusDirections_::{kInput, kOutput};
use vst3::Steinberg::Vst::MediaTypes_::kAudio;

pub struct PluginInstance {
    info: PluginInfo,
    parameters: Vec<ParameterInfo>,
    editor: Option<EditorSession>,
    slot: Arc<RealtimeSlot>,
    controller: Option<Controller>,
    component: Component,
    host: HostContext,
    module: PluginModule,
}

impl PluginInstance {
    /// Run the acquisition pipeline on a loaded module. Anything acquired before a
    /// failure is released again, module included.
    pub fn create(id: PluginId, module: PluginModule, config: &RegistryConfig) -> Result<Self> {
        let edits = Arc::new(ParamQueue::new(config.parameter_queue_capacity.max(1)));
        let host = HostContext::new(config.host_name.clone(), edits.clone());

        let factory = PluginFactory::new(module.factory()?);
        let class = factory.audio_class().ok_or_else(|| HostError::InvalidPlugin {
            path: module.path().to_path_buf(),
            reason: "no audio effect class".to_string(),
        })?;
        tracing::debug!(
            "Selected class '{}' of {} in {}",
            class.name,
            factory.class_count(),
            module.path().display()
        );

        let component = Component::create(&factory, &class, &host)?;
        let controller = Controller::acquire(&factory, &component, &host);

        let details = factory.details(&class.cid).unwrap_or_default();
        let name = if class.name.trim().is_empty() {
            file_stem(module.path())
        } else {
            class.name.clone()
        };
        let vendor = Some(details.vendor.clone())
            .filter(|v| !v.trim().is_empty())
            .or_else(|| factory.vendor())
            .unwrap_or_default();
        let category = if details.sub_categories.is_empty() {
            match &class.category {
                ClassCategory::Other(category) => category.clone(),
                _ => "Fx".to_string(),
            }
        } else {
            details.sub_categories.clone()
        };

        let parameters = controller
            .as_ref()
            .map(|c| c.parameters())
            .unwrap_or_default();
        let main_channels = |direction| {
            component
                .bus_info(kAudio as i32, direction, 0)
                .map(|bus| bus.channels)
                .unwrap_or(0)
        };
        let audio_io = AudioIO::new(main_channels(kInput as i32), main_channels(kOutput as i32));

        let info = PluginInfo::new(id, name)
            .vendor(vendor)
            .category(category)
            .version(details.version)
            .path(module.path())
            .ui(controller.is_some())
            .parameters(parameters.len())
            .audio_io(audio_io.inputs, audio_io.outputs);

        tracing::info!(
            "Loaded plugin {} '{}' by {} ({} parameters, {})",
            info.id,
            info.name,
            info.vendor,
            info.parameter_count,
            if controller.is_some() { "with controller" } else { "no controller" }
        );

        Ok(Self {
            info,
            parameters,
            editor: None,
            slot: Arc::new(RealtimeSlot::new(edits)),
            controller,
            component,
            host,
            module,
        })
    }

    pub fn id(&self) -> &PluginId {
        &self.info.id
    }

    pub fn info(&self) -> &PluginInfo {
        &self.info
    }

    pub fn state(&self) -> ProcessingState {
        self.info.state
    }

    pub fn has_controller(&self) -> bool {
        self.controller.is_some()
    }

    pub fn module(&self) -> &PluginModule {
        &self.module
    }

    pub fn host_context(&self) -> &HostContext {
        &self.host
    }

    pub fn processor(&self) -> ProcessorHandle {
        ProcessorHandle::new(self.info.id.clone(), self.slot.clone())
    }

    // ------------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------------

    /// Loaded -> ProcessingReady. On failure the instance stays `Loaded`.
    pub fn setup_processing(
        &mut self,
        sample_rate: f64,
        max_block_size: usize,
        channels: ChannelLayout,
        max_param_changes: usize,
    ) -> Result<()> {
        if self.info.state != ProcessingState::Loaded {
            return Err(HostError::State {
                operation: "set up processing",
                state: self.info.state,
            });
        }
        let context = ProcessingContext::new(sample_rate, max_block_size, channels);
        let engine = ProcessEngine::activate(&self.component, context, max_param_changes.max(1))?;
        self.slot.install(engine);
        self.info.state = ProcessingState::ProcessingReady;
        Ok(())
    }

    /// ProcessingReady -> Loaded. Returns once no block can still be running.
    pub fn stop_processing(&mut self) -> Result<()> {
        if self.info.state != ProcessingState::ProcessingReady {
            return Err(HostError::State {
                operation: "stop processing",
                state: self.info.state,
            });
        }
        if let Some(engine) = self.slot.take() {
            engine.deactivate(&self.component);
        }
        self.info.state = ProcessingState::Loaded;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Parameters
    // ------------------------------------------------------------------------

    /// False without a controller or when the plugin rejects the value.
    pub fn set_parameter(&self, id: u32, value: f64) -> bool {
        let Some(controller) = &self.controller else {
            return false;
        };
        let accepted = controller.set_normalized(id, value);
        if accepted {
            self.slot.queue(ParamChange::new(id, value));
        }
        accepted
    }

    /// 0.0 without a controller or for ids the plugin never declared.
    pub fn get_parameter(&self, id: u32) -> f64 {
        match &self.controller {
            Some(controller) if self.parameters.iter().any(|p| p.id == id) => {
                controller.normalized(id)
            }
            _ => 0.0,
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.controller
            .as_ref()
            .map(|c| c.parameter_count())
            .unwrap_or(0)
    }

    pub fn parameters(&self) -> &[ParameterInfo] {
        &self.parameters
    }

    pub fn parameter_display(&self, id: u32, value: f64) -> Option<String> {
        self.controller.as_ref()?.value_to_string(id, value)
    }

    // ------------------------------------------------------------------------
    // Editor
    // ------------------------------------------------------------------------

    pub fn show_ui(
        &mut self,
        parent: Option<WindowHandle>,
        config: &RegistryConfig,
        windows: &mut dyn WindowSystem,
    ) -> bool {
        if self.editor.is_some() {
            return true;
        }
        let Some(controller) = &self.controller else {
            return false;
        };
        if !self.info.has_ui {
            return false;
        }

        let request = EditorRequest {
            owner: &self.info.id,
            title: window_title(&self.info.name),
            parent,
            default_size: config.default_editor_size,
        };
        match EditorSession::open(controller, request, windows) {
            Ok(Some(session)) => {
                self.editor = Some(session);
                self.info.ui_visible = true;
                true
            }
            Ok(None) => {
                self.info.has_ui = false;
                false
            }
            Err(e) => {
                tracing::warn!("Failed to open editor for {}: {e}", self.info.id);
                false
            }
        }
    }

    /// Always ends hidden.
    pub fn hide_ui(&mut self, windows: &mut dyn WindowSystem) -> bool {
        if let Some(editor) = self.editor.take() {
            editor.close(windows);
            tracing::info!("Closed editor for {}", self.info.id);
        }
        self.info.ui_visible = false;
        true
    }

    pub fn editor(&self) -> Option<&EditorSession> {
        self.editor.as_ref()
    }

    /// Hide the editor and stop processing ahead of release.
    pub fn shutdown(&mut self, windows: &mut dyn WindowSystem) {
        self.hide_ui(windows);
        if self.info.state == ProcessingState::ProcessingReady {
            let _ = self.stop_processing();
        }
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        if self.editor.is_some() {
            tracing::warn!("Plugin {} dropped with its editor open", self.info.id);
            self.hide_ui(&mut crate::window::NoWindowSystem);
        }
        if self.info.state == ProcessingState::ProcessingReady {
            let _ = self.stop_processing();
        }
        tracing::debug!("Releasing plugin {}", self.info.id);
    }
}

fn file_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.strip_suffix(".vst3").map(str::to_string).unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(name)
    })
}
