//! # plughost - In-process VST3 plugin host
//!
//! Loads VST3 plugins into the host process and exposes a small host-side API for
//! their whole lifecycle.
//!
//! ## Architecture
//!
//! plughost is an umbrella crate over:
//! - **plughost-vst3** - the engine (module loading, factory inspection, component and
//!   controller acquisition, processing, parameters, editor embedding, registry)
//!
//! ## Quick Start
//!
//! ```ignore
//! use plughost::prelude::*;
//!
//! let host = PluginHost::builder().host_name("My DAW").build();
//!
//! let info = host.load_plugin("/usr/lib/vst3/Reverb.vst3")?;
//! println!("{} by {} (ui: {})", info.name, info.vendor, info.has_ui);
//!
//! host.setup_processing(&info.id, 48000.0, 256, ChannelLayout::stereo())?;
//! host.set_parameter(&info.id, 0, 0.5);
//! host.show_ui(&info.id, None);
//!
//! // Audio thread
//! let processor = host.processor(&info.id).unwrap();
//! processor.process_block(&inputs, &mut outputs, 256);
//! ```

/// Re-export of plughost-vst3 for direct access
pub use plughost_vst3 as vst3;

pub use plughost_vst3::{
    AudioIO, ChannelLayout, HostError, LoadStage, NativeWindow, ParameterFlags, ParameterInfo,
    PlatformType, PluginId, PluginInfo, PluginModule, ProcessOutcome, ProcessingState,
    ProcessorHandle, ViewSize, WindowEvent, WindowHandle, WindowSystem,
};

mod error;
pub use error::{Error, Result};

mod config;
pub use config::HostConfig;

mod builder;
pub use builder::PluginHostBuilder;

mod host;
pub use host::PluginHost;

pub mod prelude {
    pub use crate::{
        ChannelLayout, Error, HostConfig, PluginHost, PluginHostBuilder, PluginId, PluginInfo,
        ProcessOutcome, ProcessingState, ProcessorHandle, Result, WindowHandle,
    };
}
