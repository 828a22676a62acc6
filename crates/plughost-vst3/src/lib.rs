//! In-process VST3 plugin hosting
//!
//! Loads VST3 modules into the host process and drives them through the full
//! lifecycle: factory inspection, component and controller acquisition, processing
//! setup, realtime block processing, parameter control and editor embedding.
//!
//! ## Lifecycle
//!
//! ```text
//! Unloaded -> Loaded -> ProcessingReady
//!                 ^            |
//!                 +------------+
//! ```
//!
//! Every COM object acquired on the way is owned by a RAII wrapper and released
//! in reverse order before the module that provides its code is unloaded.
//!
//! ## Usage
//!
//! ```ignore
//! use plughost_vst3::{Registry, RegistryConfig, NoWindowSystem, ChannelLayout};
//!
//! let registry = Registry::new(RegistryConfig::default(), Box::new(NoWindowSystem));
//! let info = registry.load("/path/to/Reverb.vst3".as_ref())?;
//! registry.setup_processing(info.id.as_str(), 48000.0, 256, ChannelLayout::stereo())?;
//!
//! // Audio thread: clone is cheap, processing never locks the registry
//! let processor = registry.processor(info.id.as_str()).unwrap();
//! processor.process_block(&inputs, &mut outputs, 256);
//! ```

pub mod error;
pub use error::{HostError, LoadStage, Result};

mod metadata;
pub use metadata::{AudioIO, ParameterFlags, ParameterInfo, PluginId, PluginInfo};

pub mod util;

mod host_context;
pub use host_context::HostContext;

mod params;
pub use params::{HostParameterChanges, ParamChange, ParamQueue};

pub mod module;
pub use module::{PluginModule, ResidencyTracker};

pub mod factory;
pub use factory::{ClassCategory, ClassDescriptor, ClassDetails, PluginFactory};

mod stream;

pub mod component;
pub use component::{Component, Controller};

mod processing;
pub use processing::{
    ChannelLayout, ProcessEngine, ProcessOutcome, ProcessingContext, ProcessingState, SampleFormat,
    MAX_CHANNELS,
};

mod handle;
pub use handle::ProcessorHandle;

mod editor;
pub use editor::EditorSession;

pub mod window;
pub use window::{
    native_window_system, NativeWindow, NoWindowSystem, PlatformType, ViewSize, WindowEvent,
    WindowHandle, WindowSystem,
};

mod instance;
pub use instance::PluginInstance;

mod registry;
pub use registry::{Registry, RegistryConfig};

/// Raw ABI bindings, for callers implementing their own host objects.
pub use vst3;
