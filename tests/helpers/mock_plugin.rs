//! In-process mock VST3 plugin
//!
//! A factory exposing an audio component class and, optionally, a separate
//! controller class with an editor view. Every COM object registers itself in a
//! shared [`MockState`], so tests can check the host released all of them and
//! observe the calls it made.

use std::ffi::{c_void, CStr};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use plughost::vst3::util::{copy_c_chars, copy_utf16};
use plughost::PluginModule;
use vst3::Steinberg::Vst::*;
use vst3::Steinberg::*;
use vst3::{Class, ComPtr, ComRef, ComWrapper};

pub const COMPONENT_CID: TUID = cid(0x11);
pub const CONTROLLER_CID: TUID = cid(0x22);

const fn cid(tag: u8) -> TUID {
    let mut id: TUID = [0; 16];
    let mut i = 0;
    while i < 16 {
        id[i] = tag.wrapping_add(i as u8) as _;
        i += 1;
    }
    id
}

#[derive(Clone, Debug)]
pub struct MockParam {
    pub id: u32,
    pub title: &'static str,
    pub default: f64,
}

#[derive(Clone, Debug)]
pub struct MockViewConfig {
    /// `None`: `getSize` is not implemented.
    pub size: Option<(i32, i32)>,
    pub platform_supported: bool,
    pub attach_ok: bool,
}

impl Default for MockViewConfig {
    fn default() -> Self {
        Self {
            size: Some((400, 300)),
            platform_supported: true,
            attach_ok: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MockConfig {
    pub name: String,
    pub vendor: String,
    pub sub_categories: String,
    pub version: String,
    /// Separate controller class; without it the plugin has no controller at all.
    pub separate_controller: bool,
    /// `getControllerClassId` names the separate controller. When false the host
    /// has to find it among the factory's classes.
    pub declare_controller: bool,
    /// Component class also implements `IEditController`.
    pub single_object: bool,
    /// Class 0 is declared as an audio effect.
    pub audio_class: bool,
    /// Component class also implements `IAudioProcessor`.
    pub expose_processor: bool,
    pub fail_initialize: bool,
    pub accept_arrangement: bool,
    pub accept_setup: bool,
    pub accept_activate: bool,
    pub refuse_output_bus: bool,
    pub fail_process: bool,
    pub input_buses: Vec<i32>,
    pub output_buses: Vec<i32>,
    pub parameters: Vec<MockParam>,
    /// `None`: `createView` returns null.
    pub view: Option<MockViewConfig>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            name: "Mock Gain".to_string(),
            vendor: "Mock Audio".to_string(),
            sub_categories: "Fx|Dynamics".to_string(),
            version: "1.2.0".to_string(),
            separate_controller: true,
            declare_controller: true,
            single_object: false,
            audio_class: true,
            expose_processor: true,
            fail_initialize: false,
            accept_arrangement: true,
            accept_setup: true,
            accept_activate: true,
            refuse_output_bus: false,
            fail_process: false,
            input_buses: vec![2],
            output_buses: vec![2],
            parameters: vec![
                MockParam {
                    id: 0,
                    title: "Gain",
                    default: 0.5,
                },
                MockParam {
                    id: 7,
                    title: "Mix",
                    default: 1.0,
                },
            ],
            view: Some(MockViewConfig::default()),
        }
    }
}

impl MockConfig {
    pub fn without_controller() -> Self {
        Self {
            separate_controller: false,
            view: None,
            ..Self::default()
        }
    }

    /// One object acting as component, processor and controller.
    pub fn single_object() -> Self {
        Self {
            separate_controller: false,
            single_object: true,
            ..Self::default()
        }
    }
}

/// Everything the host did to the mock, as seen from the plugin side.
#[derive(Default)]
pub struct MockState {
    pub live_objects: AtomicUsize,
    pub initialized: AtomicUsize,
    pub terminated: AtomicUsize,
    pub connections: AtomicI32,
    pub state_syncs: AtomicUsize,
    pub setup_calls: AtomicUsize,
    pub max_block: AtomicI32,
    pub active_buses: AtomicI32,
    pub active: AtomicBool,
    pub processing: AtomicBool,
    pub process_calls: AtomicUsize,
    pub received_params: Mutex<Vec<(u32, f64)>>,
    pub attached_views: AtomicI32,
    pub last_parent: AtomicUsize,
    handler: Mutex<Option<ComPtr<IComponentHandler>>>,
}

// SAFETY: the handler pointer is only touched from the test's control thread.
unsafe impl Send for MockState {}
unsafe impl Sync for MockState {}

impl MockState {
    pub fn live(&self) -> usize {
        self.live_objects.load(Ordering::SeqCst)
    }

    pub fn has_handler(&self) -> bool {
        self.handler.lock().is_some()
    }

    /// Report an edit the way the plugin's own editor would.
    pub fn perform_edit(&self, id: u32, value: f64) -> bool {
        let handler = self.handler.lock();
        let Some(handler) = handler.as_ref() else {
            return false;
        };
        unsafe {
            handler.beginEdit(id);
            let result = handler.performEdit(id, value);
            handler.endEdit(id);
            result == kResultOk
        }
    }
}

/// Counts one live COM object for as long as it exists.
struct Live(Arc<MockState>);

impl Live {
    fn new(state: &Arc<MockState>) -> Self {
        state.live_objects.fetch_add(1, Ordering::SeqCst);
        Self(state.clone())
    }
}

impl Drop for Live {
    fn drop(&mut self) {
        self.0.live_objects.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockPlugin {
    pub state: Arc<MockState>,
    config: Arc<MockConfig>,
}

impl MockPlugin {
    pub fn new(config: MockConfig) -> Self {
        Self {
            state: Arc::new(MockState::default()),
            config: Arc::new(config),
        }
    }

    /// A resident module wrapping a fresh factory object.
    pub fn module(&self, path: &str) -> PluginModule {
        let factory = ComWrapper::new(MockFactory {
            config: self.config.clone(),
            state: self.state.clone(),
            _live: Live::new(&self.state),
        });
        let factory = factory
            .to_com_ptr::<IPluginFactory>()
            .expect("factory exposes IPluginFactory");
        PluginModule::from_factory(path, factory)
    }
}

fn arrangement(channels: i32) -> SpeakerArrangement {
    if channels <= 0 {
        0
    } else {
        (1u64 << channels) - 1
    }
}

// ============================================================================
// Factory
// ============================================================================

struct MockFactory {
    config: Arc<MockConfig>,
    state: Arc<MockState>,
    _live: Live,
}

impl Class for MockFactory {
    type Interfaces = (IPluginFactory2,);
}

impl MockFactory {
    fn class_info(&self, index: i32) -> Option<(TUID, &'static str)> {
        match index {
            0 if self.config.audio_class => Some((COMPONENT_CID, "Audio Module Class")),
            0 => Some((COMPONENT_CID, "Plugin Compatibility Class")),
            1 if self.config.separate_controller => {
                Some((CONTROLLER_CID, "Component Controller Class"))
            }
            _ => None,
        }
    }
}

impl IPluginFactoryTrait for MockFactory {
    unsafe fn getFactoryInfo(&self, info: *mut PFactoryInfo) -> tresult {
        let Some(info) = info.as_mut() else {
            return kInvalidArgument;
        };
        copy_c_chars(&self.config.vendor, &mut info.vendor);
        copy_c_chars("https://example.invalid", &mut info.url);
        kResultOk
    }

    unsafe fn countClasses(&self) -> i32 {
        if self.config.separate_controller {
            2
        } else {
            1
        }
    }

    unsafe fn getClassInfo(&self, index: i32, info: *mut PClassInfo) -> tresult {
        let (Some(info), Some((cid, category))) = (info.as_mut(), self.class_info(index)) else {
            return kInvalidArgument;
        };
        info.cid = cid;
        info.cardinality = PClassInfo_::ClassCardinality_::kManyInstances as int32;
        copy_c_chars(category, &mut info.category);
        copy_c_chars(&self.config.name, &mut info.name);
        kResultOk
    }

    unsafe fn createInstance(&self, cid: FIDString, iid: FIDString, obj: *mut *mut c_void) -> tresult {
        if cid.is_null() || iid.is_null() || obj.is_null() {
            return kInvalidArgument;
        }
        *obj = std::ptr::null_mut();
        let requested = &*(cid as *const TUID);

        let unknown = if *requested == COMPONENT_CID {
            if self.config.single_object {
                ComWrapper::new(MockSingleComponent {
                    component: MockComponent::new(&self.config, &self.state),
                    controller: MockController::new(&self.config, &self.state),
                })
                .to_com_ptr::<FUnknown>()
            } else if self.config.expose_processor {
                ComWrapper::new(MockComponent::new(&self.config, &self.state)).to_com_ptr::<FUnknown>()
            } else {
                ComWrapper::new(BareComponent {
                    _live: Live::new(&self.state),
                })
                .to_com_ptr::<FUnknown>()
            }
        } else if *requested == CONTROLLER_CID && self.config.separate_controller {
            ComWrapper::new(MockController::new(&self.config, &self.state)).to_com_ptr::<FUnknown>()
        } else {
            return kInvalidArgument;
        };

        let Some(unknown) = unknown else {
            return kNoInterface;
        };
        let ptr = unknown.as_ptr();
        ((*(*ptr).vtbl).queryInterface)(ptr, iid as *const TUID, obj)
    }
}

impl IPluginFactory2Trait for MockFactory {
    unsafe fn getClassInfo2(&self, index: i32, info: *mut PClassInfo2) -> tresult {
        let (Some(info), Some((cid, category))) = (info.as_mut(), self.class_info(index)) else {
            return kInvalidArgument;
        };
        info.cid = cid;
        info.cardinality = PClassInfo_::ClassCardinality_::kManyInstances as int32;
        copy_c_chars(category, &mut info.category);
        copy_c_chars(&self.config.name, &mut info.name);
        copy_c_chars(&self.config.sub_categories, &mut info.subCategories);
        copy_c_chars(&self.config.vendor, &mut info.vendor);
        copy_c_chars(&self.config.version, &mut info.version);
        copy_c_chars("VST 3.7.9", &mut info.sdkVersion);
        kResultOk
    }
}

// ============================================================================
// Component
// ============================================================================

/// Component class that forgot to implement `IAudioProcessor`.
struct BareComponent {
    _live: Live,
}

impl Class for BareComponent {
    type Interfaces = (IComponent,);
}

impl IPluginBaseTrait for BareComponent {
    unsafe fn initialize(&self, _context: *mut FUnknown) -> tresult {
        kResultOk
    }

    unsafe fn terminate(&self) -> tresult {
        kResultOk
    }
}

impl IComponentTrait for BareComponent {
    unsafe fn getControllerClassId(&self, _class_id: *mut TUID) -> tresult {
        kNotImplemented
    }

    unsafe fn setIoMode(&self, _mode: IoMode) -> tresult {
        kResultOk
    }

    unsafe fn getBusCount(&self, _media_type: MediaType, _dir: BusDirection) -> i32 {
        0
    }

    unsafe fn getBusInfo(&self, _media_type: MediaType, _dir: BusDirection, _index: i32, _bus: *mut BusInfo) -> tresult {
        kInvalidArgument
    }

    unsafe fn getRoutingInfo(&self, _in_info: *mut RoutingInfo, _out_info: *mut RoutingInfo) -> tresult {
        kNotImplemented
    }

    unsafe fn activateBus(&self, _media_type: MediaType, _dir: BusDirection, _index: i32, _state: TBool) -> tresult {
        kResultOk
    }

    unsafe fn setActive(&self, _state: TBool) -> tresult {
        kResultOk
    }

    unsafe fn setState(&self, _state: *mut IBStream) -> tresult {
        kResultOk
    }

    unsafe fn getState(&self, _state: *mut IBStream) -> tresult {
        kNotImplemented
    }
}

struct MockComponent {
    config: Arc<MockConfig>,
    state: Arc<MockState>,
    _live: Live,
}

impl MockComponent {
    fn new(config: &Arc<MockConfig>, state: &Arc<MockState>) -> Self {
        Self {
            config: config.clone(),
            state: state.clone(),
            _live: Live::new(state),
        }
    }

    fn buses(&self, dir: BusDirection) -> &[i32] {
        if dir == BusDirections_::kInput as BusDirection {
            &self.config.input_buses
        } else {
            &self.config.output_buses
        }
    }
}

impl Class for MockComponent {
    type Interfaces = (IComponent, IAudioProcessor, IConnectionPoint);
}

impl IPluginBaseTrait for MockComponent {
    unsafe fn initialize(&self, context: *mut FUnknown) -> tresult {
        if self.config.fail_initialize || context.is_null() {
            return kResultFalse;
        }
        self.state.initialized.fetch_add(1, Ordering::SeqCst);
        kResultOk
    }

    unsafe fn terminate(&self) -> tresult {
        self.state.terminated.fetch_add(1, Ordering::SeqCst);
        kResultOk
    }
}

impl IComponentTrait for MockComponent {
    unsafe fn getControllerClassId(&self, class_id: *mut TUID) -> tresult {
        if class_id.is_null() {
            return kInvalidArgument;
        }
        if !(self.config.separate_controller && self.config.declare_controller) {
            return kNotImplemented;
        }
        *class_id = CONTROLLER_CID;
        kResultOk
    }

    unsafe fn setIoMode(&self, _mode: IoMode) -> tresult {
        kResultOk
    }

    unsafe fn getBusCount(&self, media_type: MediaType, dir: BusDirection) -> i32 {
        if media_type != MediaTypes_::kAudio as MediaType {
            return 0;
        }
        self.buses(dir).len() as i32
    }

    unsafe fn getBusInfo(&self, media_type: MediaType, dir: BusDirection, index: i32, bus: *mut BusInfo) -> tresult {
        let Some(bus) = bus.as_mut() else {
            return kInvalidArgument;
        };
        if media_type != MediaTypes_::kAudio as MediaType {
            return kInvalidArgument;
        }
        let Some(&channels) = self.buses(dir).get(index as usize) else {
            return kInvalidArgument;
        };
        bus.mediaType = media_type;
        bus.direction = dir;
        bus.channelCount = channels;
        copy_utf16(if index == 0 { "Main" } else { "Aux" }, &mut bus.name);
        bus.busType = if index == 0 {
            BusTypes_::kMain as BusType
        } else {
            BusTypes_::kAux as BusType
        };
        bus.flags = BusInfo_::BusFlags_::kDefaultActive as u32;
        kResultOk
    }

    unsafe fn getRoutingInfo(&self, _in_info: *mut RoutingInfo, _out_info: *mut RoutingInfo) -> tresult {
        kNotImplemented
    }

    unsafe fn activateBus(&self, _media_type: MediaType, dir: BusDirection, _index: i32, state: TBool) -> tresult {
        if self.config.refuse_output_bus && dir == BusDirections_::kOutput as BusDirection && state != 0 {
            return kResultFalse;
        }
        let delta = if state != 0 { 1 } else { -1 };
        self.state.active_buses.fetch_add(delta, Ordering::SeqCst);
        kResultOk
    }

    unsafe fn setActive(&self, state: TBool) -> tresult {
        if state != 0 && !self.config.accept_activate {
            return kResultFalse;
        }
        self.state.active.store(state != 0, Ordering::SeqCst);
        kResultOk
    }

    unsafe fn setState(&self, _state: *mut IBStream) -> tresult {
        kResultOk
    }

    unsafe fn getState(&self, state: *mut IBStream) -> tresult {
        let Some(stream) = ComRef::from_raw(state) else {
            return kInvalidArgument;
        };
        let mut payload = *b"mock-state";
        let mut written = 0;
        stream.write(payload.as_mut_ptr() as *mut c_void, payload.len() as int32, &mut written)
    }
}

impl IAudioProcessorTrait for MockComponent {
    unsafe fn setBusArrangements(
        &self,
        _inputs: *mut SpeakerArrangement,
        _num_ins: i32,
        _outputs: *mut SpeakerArrangement,
        _num_outs: i32,
    ) -> tresult {
        if self.config.accept_arrangement {
            kResultOk
        } else {
            kResultFalse
        }
    }

    unsafe fn getBusArrangement(&self, dir: BusDirection, index: i32, arr: *mut SpeakerArrangement) -> tresult {
        let (Some(arr), Some(&channels)) = (arr.as_mut(), self.buses(dir).get(index as usize)) else {
            return kInvalidArgument;
        };
        *arr = arrangement(channels);
        kResultOk
    }

    unsafe fn canProcessSampleSize(&self, symbolic_sample_size: i32) -> tresult {
        if symbolic_sample_size == SymbolicSampleSizes_::kSample32 as i32 {
            kResultOk
        } else {
            kResultFalse
        }
    }

    unsafe fn getLatencySamples(&self) -> u32 {
        0
    }

    unsafe fn setupProcessing(&self, setup: *mut ProcessSetup) -> tresult {
        let Some(setup) = setup.as_ref() else {
            return kInvalidArgument;
        };
        self.state.setup_calls.fetch_add(1, Ordering::SeqCst);
        if !self.config.accept_setup {
            return kResultFalse;
        }
        self.state.max_block.store(setup.maxSamplesPerBlock, Ordering::SeqCst);
        kResultOk
    }

    unsafe fn setProcessing(&self, state: TBool) -> tresult {
        self.state.processing.store(state != 0, Ordering::SeqCst);
        kResultOk
    }

    unsafe fn process(&self, data: *mut ProcessData) -> tresult {
        self.state.process_calls.fetch_add(1, Ordering::SeqCst);
        let Some(data) = data.as_ref() else {
            return kInvalidArgument;
        };
        if self.config.fail_process || data.numSamples > self.state.max_block.load(Ordering::SeqCst) {
            return kResultFalse;
        }

        if let Some(changes) = ComRef::from_raw(data.inputParameterChanges) {
            let mut received = self.state.received_params.lock();
            for index in 0..changes.getParameterCount() {
                let Some(queue) = ComRef::from_raw(changes.getParameterData(index)) else {
                    continue;
                };
                let mut offset = 0;
                let mut value = 0.0;
                let last = queue.getPointCount() - 1;
                if queue.getPoint(last, &mut offset, &mut value) == kResultOk {
                    received.push((queue.getParameterId(), value));
                }
            }
        }

        if data.numInputs > 0 && data.numOutputs > 0 {
            let input = &*data.inputs;
            let output = &*data.outputs;
            let channels = input.numChannels.min(output.numChannels).max(0) as usize;
            for ch in 0..channels {
                let src = *input.__field0.channelBuffers32.add(ch);
                let dst = *output.__field0.channelBuffers32.add(ch);
                std::ptr::copy(src, dst, data.numSamples as usize);
            }
        }
        kResultOk
    }

    unsafe fn getTailSamples(&self) -> u32 {
        0
    }
}

impl IConnectionPointTrait for MockComponent {
    unsafe fn connect(&self, other: *mut IConnectionPoint) -> tresult {
        if other.is_null() {
            return kInvalidArgument;
        }
        self.state.connections.fetch_add(1, Ordering::SeqCst);
        kResultOk
    }

    unsafe fn disconnect(&self, _other: *mut IConnectionPoint) -> tresult {
        self.state.connections.fetch_sub(1, Ordering::SeqCst);
        kResultOk
    }

    unsafe fn notify(&self, _message: *mut IMessage) -> tresult {
        kResultOk
    }
}

// ============================================================================
// Controller
// ============================================================================

struct MockController {
    config: Arc<MockConfig>,
    state: Arc<MockState>,
    values: Mutex<Vec<f64>>,
    _live: Live,
}

impl MockController {
    fn new(config: &Arc<MockConfig>, state: &Arc<MockState>) -> Self {
        Self {
            config: config.clone(),
            state: state.clone(),
            values: Mutex::new(config.parameters.iter().map(|p| p.default).collect()),
            _live: Live::new(state),
        }
    }

    fn index_of(&self, id: u32) -> Option<usize> {
        self.config.parameters.iter().position(|p| p.id == id)
    }
}

impl Class for MockController {
    type Interfaces = (IEditController, IConnectionPoint);
}

impl IPluginBaseTrait for MockController {
    unsafe fn initialize(&self, context: *mut FUnknown) -> tresult {
        if context.is_null() {
            return kInvalidArgument;
        }
        self.state.initialized.fetch_add(1, Ordering::SeqCst);
        kResultOk
    }

    unsafe fn terminate(&self) -> tresult {
        self.state.terminated.fetch_add(1, Ordering::SeqCst);
        kResultOk
    }
}

impl IEditControllerTrait for MockController {
    unsafe fn setComponentState(&self, state: *mut IBStream) -> tresult {
        if state.is_null() {
            return kInvalidArgument;
        }
        self.state.state_syncs.fetch_add(1, Ordering::SeqCst);
        kResultOk
    }

    unsafe fn setState(&self, _state: *mut IBStream) -> tresult {
        kResultOk
    }

    unsafe fn getState(&self, _state: *mut IBStream) -> tresult {
        kResultOk
    }

    unsafe fn getParameterCount(&self) -> i32 {
        self.config.parameters.len() as i32
    }

    unsafe fn getParameterInfo(&self, param_index: i32, info: *mut ParameterInfo) -> tresult {
        let (Some(info), Some(param)) = (info.as_mut(), self.config.parameters.get(param_index as usize)) else {
            return kInvalidArgument;
        };
        info.id = param.id;
        copy_utf16(param.title, &mut info.title);
        copy_utf16(param.title, &mut info.shortTitle);
        copy_utf16("%", &mut info.units);
        info.stepCount = 0;
        info.defaultNormalizedValue = param.default;
        info.unitId = 0;
        info.flags = ParameterInfo_::ParameterFlags_::kCanAutomate as int32;
        kResultOk
    }

    unsafe fn getParamStringByValue(&self, id: u32, value_normalized: f64, string: *mut String128) -> tresult {
        let (Some(string), Some(_)) = (string.as_mut(), self.index_of(id)) else {
            return kInvalidArgument;
        };
        copy_utf16(&format!("{:.0}%", value_normalized * 100.0), string);
        kResultOk
    }

    unsafe fn getParamValueByString(&self, _id: u32, _string: *mut TChar, _value_normalized: *mut f64) -> tresult {
        kNotImplemented
    }

    unsafe fn normalizedParamToPlain(&self, _id: u32, value_normalized: f64) -> f64 {
        value_normalized
    }

    unsafe fn plainParamToNormalized(&self, _id: u32, plain_value: f64) -> f64 {
        plain_value
    }

    unsafe fn getParamNormalized(&self, id: u32) -> f64 {
        self.index_of(id)
            .map(|index| self.values.lock()[index])
            .unwrap_or(0.0)
    }

    unsafe fn setParamNormalized(&self, id: u32, value: f64) -> tresult {
        let Some(index) = self.index_of(id) else {
            return kInvalidArgument;
        };
        if !(0.0..=1.0).contains(&value) {
            return kResultFalse;
        }
        self.values.lock()[index] = value;
        kResultOk
    }

    unsafe fn setComponentHandler(&self, handler: *mut IComponentHandler) -> tresult {
        *self.state.handler.lock() = ComRef::from_raw(handler).map(|h| h.to_com_ptr());
        kResultOk
    }

    unsafe fn createView(&self, name: FIDString) -> *mut IPlugView {
        if name.is_null() || CStr::from_ptr(name) != c"editor" {
            return std::ptr::null_mut();
        }
        let Some(view) = &self.config.view else {
            return std::ptr::null_mut();
        };
        ComWrapper::new(MockView {
            config: view.clone(),
            state: self.state.clone(),
            _live: Live::new(&self.state),
        })
        .to_com_ptr::<IPlugView>()
        .map(|view| view.into_raw())
        .unwrap_or(std::ptr::null_mut())
    }
}

impl IConnectionPointTrait for MockController {
    unsafe fn connect(&self, other: *mut IConnectionPoint) -> tresult {
        if other.is_null() {
            return kInvalidArgument;
        }
        self.state.connections.fetch_add(1, Ordering::SeqCst);
        kResultOk
    }

    unsafe fn disconnect(&self, _other: *mut IConnectionPoint) -> tresult {
        self.state.connections.fetch_sub(1, Ordering::SeqCst);
        kResultOk
    }

    unsafe fn notify(&self, _message: *mut IMessage) -> tresult {
        kResultOk
    }
}

// ============================================================================
// Single-object component
// ============================================================================

/// Component that answers for its own controller. Calls are forwarded to the
/// regular component and controller implementations.
struct MockSingleComponent {
    component: MockComponent,
    controller: MockController,
}

impl Class for MockSingleComponent {
    type Interfaces = (IComponent, IAudioProcessor, IEditController);
}

impl IPluginBaseTrait for MockSingleComponent {
    unsafe fn initialize(&self, context: *mut FUnknown) -> tresult {
        IPluginBaseTrait::initialize(&self.component, context)
    }

    unsafe fn terminate(&self) -> tresult {
        IPluginBaseTrait::terminate(&self.component)
    }
}

impl IComponentTrait for MockSingleComponent {
    unsafe fn getControllerClassId(&self, class_id: *mut TUID) -> tresult {
        self.component.getControllerClassId(class_id)
    }

    unsafe fn setIoMode(&self, mode: IoMode) -> tresult {
        self.component.setIoMode(mode)
    }

    unsafe fn getBusCount(&self, media_type: MediaType, dir: BusDirection) -> i32 {
        self.component.getBusCount(media_type, dir)
    }

    unsafe fn getBusInfo(&self, media_type: MediaType, dir: BusDirection, index: i32, bus: *mut BusInfo) -> tresult {
        self.component.getBusInfo(media_type, dir, index, bus)
    }

    unsafe fn getRoutingInfo(&self, in_info: *mut RoutingInfo, out_info: *mut RoutingInfo) -> tresult {
        self.component.getRoutingInfo(in_info, out_info)
    }

    unsafe fn activateBus(&self, media_type: MediaType, dir: BusDirection, index: i32, state: TBool) -> tresult {
        self.component.activateBus(media_type, dir, index, state)
    }

    unsafe fn setActive(&self, state: TBool) -> tresult {
        self.component.setActive(state)
    }

    unsafe fn setState(&self, state: *mut IBStream) -> tresult {
        IComponentTrait::setState(&self.component, state)
    }

    unsafe fn getState(&self, state: *mut IBStream) -> tresult {
        IComponentTrait::getState(&self.component, state)
    }
}

impl IAudioProcessorTrait for MockSingleComponent {
    unsafe fn setBusArrangements(
        &self,
        inputs: *mut SpeakerArrangement,
        num_ins: i32,
        outputs: *mut SpeakerArrangement,
        num_outs: i32,
    ) -> tresult {
        self.component.setBusArrangements(inputs, num_ins, outputs, num_outs)
    }

    unsafe fn getBusArrangement(&self, dir: BusDirection, index: i32, arr: *mut SpeakerArrangement) -> tresult {
        self.component.getBusArrangement(dir, index, arr)
    }

    unsafe fn canProcessSampleSize(&self, symbolic_sample_size: i32) -> tresult {
        self.component.canProcessSampleSize(symbolic_sample_size)
    }

    unsafe fn getLatencySamples(&self) -> u32 {
        self.component.getLatencySamples()
    }

    unsafe fn setupProcessing(&self, setup: *mut ProcessSetup) -> tresult {
        self.component.setupProcessing(setup)
    }

    unsafe fn setProcessing(&self, state: TBool) -> tresult {
        self.component.setProcessing(state)
    }

    unsafe fn process(&self, data: *mut ProcessData) -> tresult {
        self.component.process(data)
    }

    unsafe fn getTailSamples(&self) -> u32 {
        self.component.getTailSamples()
    }
}

impl IEditControllerTrait for MockSingleComponent {
    unsafe fn setComponentState(&self, state: *mut IBStream) -> tresult {
        self.controller.setComponentState(state)
    }

    unsafe fn setState(&self, state: *mut IBStream) -> tresult {
        IEditControllerTrait::setState(&self.controller, state)
    }

    unsafe fn getState(&self, state: *mut IBStream) -> tresult {
        IEditControllerTrait::getState(&self.controller, state)
    }

    unsafe fn getParameterCount(&self) -> i32 {
        self.controller.getParameterCount()
    }

    unsafe fn getParameterInfo(&self, param_index: i32, info: *mut ParameterInfo) -> tresult {
        self.controller.getParameterInfo(param_index, info)
    }

    unsafe fn getParamStringByValue(&self, id: u32, value_normalized: f64, string: *mut String128) -> tresult {
        self.controller.getParamStringByValue(id, value_normalized, string)
    }

    unsafe fn getParamValueByString(&self, id: u32, string: *mut TChar, value_normalized: *mut f64) -> tresult {
        self.controller.getParamValueByString(id, string, value_normalized)
    }

    unsafe fn normalizedParamToPlain(&self, id: u32, value_normalized: f64) -> f64 {
        self.controller.normalizedParamToPlain(id, value_normalized)
    }

    unsafe fn plainParamToNormalized(&self, id: u32, plain_value: f64) -> f64 {
        self.controller.plainParamToNormalized(id, plain_value)
    }

    unsafe fn getParamNormalized(&self, id: u32) -> f64 {
        self.controller.getParamNormalized(id)
    }

    unsafe fn setParamNormalized(&self, id: u32, value: f64) -> tresult {
        self.controller.setParamNormalized(id, value)
    }

    unsafe fn setComponentHandler(&self, handler: *mut IComponentHandler) -> tresult {
        self.controller.setComponentHandler(handler)
    }

    unsafe fn createView(&self, name: FIDString) -> *mut IPlugView {
        self.controller.createView(name)
    }
}

// ============================================================================
// Editor view
// ============================================================================

struct MockView {
    config: MockViewConfig,
    state: Arc<MockState>,
    _live: Live,
}

impl Class for MockView {
    type Interfaces = (IPlugView,);
}

impl IPlugViewTrait for MockView {
    unsafe fn isPlatformTypeSupported(&self, _type_: FIDString) -> tresult {
        if self.config.platform_supported {
            kResultOk
        } else {
            kResultFalse
        }
    }

    unsafe fn attached(&self, parent: *mut c_void, _type_: FIDString) -> tresult {
        if !self.config.attach_ok || parent.is_null() {
            return kResultFalse;
        }
        self.state.attached_views.fetch_add(1, Ordering::SeqCst);
        self.state.last_parent.store(parent as usize, Ordering::SeqCst);
        kResultOk
    }

    unsafe fn removed(&self) -> tresult {
        self.state.attached_views.fetch_sub(1, Ordering::SeqCst);
        kResultOk
    }

    unsafe fn onWheel(&self, _distance: f32) -> tresult {
        kResultOk
    }

    unsafe fn onKeyDown(&self, _key: char16, _key_code: int16, _modifiers: int16) -> tresult {
        kResultFalse
    }

    unsafe fn onKeyUp(&self, _key: char16, _key_code: int16, _modifiers: int16) -> tresult {
        kResultFalse
    }

    unsafe fn getSize(&self, size: *mut ViewRect) -> tresult {
        let (Some(rect), Some((width, height))) = (size.as_mut(), self.config.size) else {
            return kNotImplemented;
        };
        rect.left = 0;
        rect.top = 0;
        rect.right = width;
        rect.bottom = height;
        kResultOk
    }

    unsafe fn onSize(&self, _new_size: *mut ViewRect) -> tresult {
        kResultOk
    }

    unsafe fn onFocus(&self, _state: TBool) -> tresult {
        kResultOk
    }

    unsafe fn setFrame(&self, _frame: *mut IPlugFrame) -> tresult {
        kResultOk
    }

    unsafe fn canResize(&self) -> tresult {
        kResultFalse
    }

    unsafe fn checkSizeConstraint(&self, _rect: *mut ViewRect) -> tresult {
        kResultOk
    }
}
