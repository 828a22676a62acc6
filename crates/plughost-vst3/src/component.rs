//! Acquisition of the processing component and its edit controller.

use vst3::Steinberg::Vst::{
    BusDirection, BusInfo, IAudioProcessor, IComponent, IComponentTrait as _, IConnectionPoint,
    IConnectionPointTrait as _, IEditController, IEditControllerTrait as _, MediaType,
};
use vst3::Steinberg::{kResultOk, IPluginBaseTrait as _, TUID};
use vst3::ComPtr;

use crate::error::{HostError, LoadStage, Result};
use crate::factory::{ClassDescriptor, PluginFactory};
use crate::host_context::HostContext;
use crate::stream::MemoryStream;
use crate::util::{tuid_to_bytes, utf16_to_string};

/// An initialized `IComponent` together with its `IAudioProcessor`.
/// Terminated and released on drop.
pub struct Component {
    processor: ComPtr<IAudioProcessor>,
    component: ComPtr<IComponent>,
}

// SAFETY: component calls are serialized by the owning instance; the processor is
// only shared with the realtime slot while the instance is in ProcessingReady.
unsafe impl Send for Component {}

impl Component {
    /// Create `class`, query `IAudioProcessor`, then initialize with the host context.
    /// Every failure releases what was acquired so far.
    pub fn create(
        factory: &PluginFactory<'_>,
        class: &ClassDescriptor,
        host: &HostContext,
    ) -> Result<Self> {
        let component: ComPtr<IComponent> = factory.create(&class.tuid(), "IComponent")?;
        let processor =
            component
                .cast::<IAudioProcessor>()
                .ok_or(HostError::InterfaceNotFound {
                    interface: "IAudioProcessor",
                })?;

        let context = host.unknown()?;
        let result = unsafe { component.initialize(context.as_ptr()) };
        if result != kResultOk {
            return Err(HostError::Init {
                stage: LoadStage::Initialization,
                code: result,
            });
        }

        tracing::debug!("Initialized component '{}'", class.name);
        Ok(Self {
            processor,
            component,
        })
    }

    pub fn component(&self) -> &ComPtr<IComponent> {
        &self.component
    }

    pub fn processor(&self) -> &ComPtr<IAudioProcessor> {
        &self.processor
    }

    /// Class id the component names as its controller, if any.
    pub fn controller_class_id(&self) -> Option<[u8; 16]> {
        let mut cid: TUID = [0; 16];
        let result = unsafe { self.component.getControllerClassId(&mut cid) };
        let cid = tuid_to_bytes(&cid);
        (result == kResultOk && cid != [0; 16]).then_some(cid)
    }

    pub fn bus_count(&self, media: MediaType, direction: BusDirection) -> usize {
        unsafe { self.component.getBusCount(media, direction) }.max(0) as usize
    }

    pub fn bus_info(&self, media: MediaType, direction: BusDirection, index: usize) -> Option<BusDescriptor> {
        let mut info: BusInfo = unsafe { std::mem::zeroed() };
        let result = unsafe {
            self.component
                .getBusInfo(media, direction, index as i32, &mut info)
        };
        (result == kResultOk).then(|| BusDescriptor {
            name: utf16_to_string(&info.name),
            channels: info.channelCount.max(0) as usize,
        })
    }

    pub fn activate_bus(&self, media: MediaType, direction: BusDirection, index: usize, active: bool) -> bool {
        let state = if active { 1 } else { 0 };
        unsafe {
            self.component
                .activateBus(media, direction, index as i32, state)
                == kResultOk
        }
    }

    pub fn set_active(&self, active: bool) -> bool {
        unsafe { self.component.setActive(if active { 1 } else { 0 }) == kResultOk }
    }
}

impl Drop for Component {
    fn drop(&mut self) {
        let result = unsafe { self.component.terminate() };
        if result != kResultOk {
            tracing::debug!("Component terminate returned {result:#x}");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusDescriptor {
    pub name: String,
    pub channels: usize,
}

/// Both halves of a component/controller message connection.
struct Connection {
    component: ComPtr<IConnectionPoint>,
    controller: ComPtr<IConnectionPoint>,
}

impl Connection {
    fn establish(component: &Component, controller: &ComPtr<IEditController>) -> Option<Self> {
        let component = component.component.cast::<IConnectionPoint>()?;
        let controller = controller.cast::<IConnectionPoint>()?;
        unsafe {
            component.connect(controller.as_ptr());
            controller.connect(component.as_ptr());
        }
        Some(Self {
            component,
            controller,
        })
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        unsafe {
            self.component.disconnect(self.controller.as_ptr());
            self.controller.disconnect(self.component.as_ptr());
        }
    }
}

/// The `IEditController` of an instance.
///
/// Either a separate object (initialized and terminated by us) or the component
/// itself queried for the controller interface.
pub struct Controller {
    connection: Option<Connection>,
    controller: ComPtr<IEditController>,
    separate: bool,
}

// SAFETY: controller calls happen on control threads under the registry lock.
unsafe impl Send for Controller {}

impl Controller {
    /// Find the controller for `component`. Absence is a normal outcome, so
    /// failures are logged and reported as `None`.
    pub fn acquire(
        factory: &PluginFactory<'_>,
        component: &Component,
        host: &HostContext,
    ) -> Option<Self> {
        let declared = component
            .controller_class_id()
            .or_else(|| factory.controller_class().map(|class| class.cid));

        let controller = match declared {
            Some(cid) => match Self::create_separate(factory, &cid, host) {
                Ok(controller) => Some(controller),
                Err(e) => {
                    tracing::warn!("Declared controller unavailable: {e}");
                    None
                }
            },
            None => None,
        };

        let mut controller = controller.or_else(|| {
            component
                .component
                .cast::<IEditController>()
                .map(|controller| Self {
                    connection: None,
                    controller,
                    separate: false,
                })
        })?;

        if let Ok(handler) = host.component_handler() {
            unsafe { controller.controller.setComponentHandler(handler.as_ptr()) };
        }

        if controller.separate {
            controller.connection = Connection::establish(component, &controller.controller);
            if controller.connection.is_none() {
                tracing::debug!("Controller has no connection point; messages disabled");
            }
            controller.sync_component_state(component);
        }

        tracing::debug!(
            "Acquired {} controller",
            if controller.separate { "separate" } else { "single-object" }
        );
        Some(controller)
    }

    fn create_separate(
        factory: &PluginFactory<'_>,
        cid: &[u8; 16],
        host: &HostContext,
    ) -> Result<Self> {
        let tuid = crate::util::guid_to_tuid(cid);
        let controller: ComPtr<IEditController> = factory.create(&tuid, "IEditController")?;
        let context = host.unknown()?;
        let result = unsafe { controller.initialize(context.as_ptr()) };
        if result != kResultOk {
            return Err(HostError::Init {
                stage: LoadStage::Connection,
                code: result,
            });
        }
        Ok(Self {
            connection: None,
            controller,
            separate: true,
        })
    }

    /// Push the component's current state to the controller.
    fn sync_component_state(&self, component: &Component) {
        let wrapper = MemoryStream::empty();
        let Some(stream) = MemoryStream::as_stream(&wrapper) else {
            return;
        };
        if unsafe { component.component.getState(stream.as_ptr()) } != kResultOk {
            return;
        }
        wrapper.rewind();
        let result = unsafe { self.controller.setComponentState(stream.as_ptr()) };
        if result != kResultOk {
            tracing::debug!("Controller ignored component state ({result:#x})");
        }
    }

    pub fn is_separate(&self) -> bool {
        self.separate
    }

    pub fn edit_controller(&self) -> &ComPtr<IEditController> {
        &self.controller
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.connection.take();
        unsafe {
            self.controller.setComponentHandler(std::ptr::null_mut());
        }
        if self.separate {
            let result = unsafe { self.controller.terminate() };
            if result != kResultOk {
                tracing::debug!("Controller terminate returned {result:#x}");
            }
        }
    }
}
