//! Plugin and parameter metadata reported to callers.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::processing::ProcessingState;

/// Registry key of a loaded instance. Generated per load, never derived from the path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PluginId(String);

impl PluginId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PluginId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PluginId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for PluginId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for PluginId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Channel counts of the main audio buses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioIO {
    pub inputs: usize,
    pub outputs: usize,
}

impl AudioIO {
    pub fn new(inputs: usize, outputs: usize) -> Self {
        Self { inputs, outputs }
    }

    /// Stereo in, stereo out
    pub fn stereo() -> Self {
        Self::new(2, 2)
    }
}

/// Snapshot of a loaded instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub id: PluginId,

    /// Display name of the selected audio class
    pub name: String,

    pub vendor: String,

    /// Sub-categories of the selected class (e.g. "Fx|Reverb"), or its category
    pub category: String,

    pub version: String,

    /// Path the plugin was loaded from
    pub path: PathBuf,

    /// Controller present and editor not yet refused
    pub has_ui: bool,

    pub ui_visible: bool,

    pub state: ProcessingState,

    pub parameter_count: usize,

    pub audio_io: AudioIO,
}

impl PluginInfo {
    pub const UNKNOWN_VENDOR: &'static str = "Unknown Vendor";

    pub fn new(id: impl Into<PluginId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            vendor: Self::UNKNOWN_VENDOR.to_string(),
            category: String::new(),
            version: String::new(),
            path: PathBuf::new(),
            has_ui: false,
            ui_visible: false,
            state: ProcessingState::Loaded,
            parameter_count: 0,
            audio_io: AudioIO::default(),
        }
    }

    /// Empty vendors keep the placeholder.
    pub fn vendor(mut self, vendor: impl Into<String>) -> Self {
        let vendor = vendor.into();
        if !vendor.trim().is_empty() {
            self.vendor = vendor;
        }
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn ui(mut self, has_ui: bool) -> Self {
        self.has_ui = has_ui;
        self
    }

    pub fn parameters(mut self, count: usize) -> Self {
        self.parameter_count = count;
        self
    }

    pub fn audio_io(mut self, inputs: usize, outputs: usize) -> Self {
        self.audio_io = AudioIO::new(inputs, outputs);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterFlags {
    pub automatable: bool,
    pub read_only: bool,
    pub wrap: bool,
    pub is_bypass: bool,
    pub is_list: bool,
    pub hidden: bool,
}

impl ParameterFlags {
    pub(crate) fn from_vst3(flags: i32) -> Self {
        use vst3::Steinberg::Vst::ParameterInfo_::ParameterFlags_::*;
        let has = |bit: i32| flags & bit != 0;
        Self {
            automatable: has(kCanAutomate as i32),
            read_only: has(kIsReadOnly as i32),
            wrap: has(kIsWrapAround as i32),
            is_bypass: has(kIsBypass as i32),
            is_list: has(kIsList as i32),
            hidden: has(kIsHidden as i32),
        }
    }
}

/// `id` is the VST3 `ParamID`, not the enumeration index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub id: u32,
    pub name: String,
    pub short_name: String,
    pub unit: String,
    pub default_value: f64,
    /// 0 = continuous
    pub step_count: u32,
    pub flags: ParameterFlags,
}

impl ParameterInfo {
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            short_name: String::new(),
            unit: String::new(),
            default_value: 0.0,
            step_count: 0,
            flags: ParameterFlags::default(),
        }
    }
}
