//! Host-side COM objects handed to plugins.

use std::ffi::c_void;
use std::sync::Arc;

use vst3::Steinberg::Vst::{
    IComponentHandler, IComponentHandlerTrait, IHostApplication, IHostApplicationTrait, ParamID,
    ParamValue, String128,
};
use vst3::Steinberg::{int32, kInvalidArgument, kNotImplemented, kResultOk, tresult, FUnknown, TUID};
use vst3::{Class, ComPtr, ComWrapper};

use crate::error::{HostError, Result};
use crate::params::{ParamChange, ParamQueue};
use crate::util::copy_utf16;

/// `IHostApplication` passed to `initialize`.
pub struct HostApplication {
    name: String,
}

impl Class for HostApplication {
    type Interfaces = (IHostApplication,);
}

impl IHostApplicationTrait for HostApplication {
    unsafe fn getName(&self, name: *mut String128) -> tresult {
        if name.is_null() {
            return kInvalidArgument;
        }
        copy_utf16(&self.name, unsafe { &mut *name });
        kResultOk
    }

    unsafe fn createInstance(
        &self,
        _cid: *mut TUID,
        _iid: *mut TUID,
        obj: *mut *mut c_void,
    ) -> tresult {
        if !obj.is_null() {
            unsafe { *obj = std::ptr::null_mut() };
        }
        kNotImplemented
    }
}

/// Receives edits made in the plugin's own editor and forwards them to the processor.
pub struct ComponentHandler {
    edits: Arc<ParamQueue>,
}

impl Class for ComponentHandler {
    type Interfaces = (IComponentHandler,);
}

impl IComponentHandlerTrait for ComponentHandler {
    unsafe fn beginEdit(&self, _id: ParamID) -> tresult {
        kResultOk
    }

    unsafe fn performEdit(&self, id: ParamID, value_normalized: ParamValue) -> tresult {
        self.edits.force_push(ParamChange::new(id, value_normalized));
        kResultOk
    }

    unsafe fn endEdit(&self, _id: ParamID) -> tresult {
        kResultOk
    }

    unsafe fn restartComponent(&self, flags: int32) -> tresult {
        tracing::debug!("Plugin requested restart (flags {flags:#x}), ignored");
        kResultOk
    }
}

/// Host objects owned by one plugin instance.
pub struct HostContext {
    application: ComWrapper<HostApplication>,
    handler: ComWrapper<ComponentHandler>,
}

impl HostContext {
    pub fn new(host_name: impl Into<String>, edits: Arc<ParamQueue>) -> Self {
        Self {
            application: ComWrapper::new(HostApplication {
                name: host_name.into(),
            }),
            handler: ComWrapper::new(ComponentHandler { edits }),
        }
    }

    /// Context pointer for `IPluginBase::initialize`.
    pub fn unknown(&self) -> Result<ComPtr<FUnknown>> {
        self.application
            .to_com_ptr::<FUnknown>()
            .ok_or(HostError::InterfaceNotFound {
                interface: "FUnknown",
            })
    }

    pub fn component_handler(&self) -> Result<ComPtr<IComponentHandler>> {
        self.handler
            .to_com_ptr::<IComponentHandler>()
            .ok_or(HostError::InterfaceNotFound {
                interface: "IComponentHandler",
            })
    }
}
