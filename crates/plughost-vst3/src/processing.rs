//! Processing setup negotiation and the per-block realtime engine.
//!
//! [`ProcessEngine::activate`] takes a `Loaded` component through bus arrangement,
//! `setupProcessing`, bus activation and `setActive`. The resulting engine owns every
//! buffer and host object the block call needs, so [`ProcessEngine::process`] never
//! allocates, locks or logs.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use vst3::Steinberg::Vst::BusDirections_::{kInput, kOutput};
use vst3::Steinberg::Vst::MediaTypes_::kAudio;
use vst3::Steinberg::Vst::ProcessContext_::StatesAndFlags_::{kTempoValid, kTimeSigValid};
use vst3::Steinberg::Vst::ProcessModes_::kRealtime;
use vst3::Steinberg::Vst::SymbolicSampleSizes_::kSample32;
use vst3::Steinberg::Vst::{
    AudioBusBuffers, AudioBusBuffers__type0, BusDirection, Event, IAudioProcessor,
    IAudioProcessorTrait as _, IEventList, IEventListTrait, IParameterChanges, ProcessContext,
    ProcessData, ProcessSetup, SpeakerArrangement,
};
use vst3::Steinberg::{int32, kNotImplemented, kResultFalse, kResultOk, tresult};
use vst3::{Class, ComPtr, ComWrapper};

use crate::component::Component;
use crate::error::{HostError, LoadStage, Result};
use crate::metadata::AudioIO;
use crate::params::{HostParameterChanges, ParamQueue};

/// Lifecycle of a loaded instance. Absence from the registry is the unloaded state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Loaded,
    ProcessingReady,
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingState::Loaded => write!(f, "loaded"),
            ProcessingState::ProcessingReady => write!(f, "processing"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleFormat {
    #[default]
    Float32,
}

/// Requested channel counts of the main input and output bus.
pub type ChannelLayout = AudioIO;

/// Parameters negotiated for one activation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessingContext {
    pub sample_rate: f64,
    pub max_block_size: usize,
    pub channels: ChannelLayout,
    pub sample_format: SampleFormat,
}

/// Widest bus a `SpeakerArrangement` bitmask can describe.
pub const MAX_CHANNELS: usize = SpeakerArrangement::BITS as usize;

impl ProcessingContext {
    pub fn new(sample_rate: f64, max_block_size: usize, channels: ChannelLayout) -> Self {
        Self {
            sample_rate,
            max_block_size,
            channels,
            sample_format: SampleFormat::Float32,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(HostError::setup(
                LoadStage::Setup,
                format!("invalid sample rate {}", self.sample_rate),
            ));
        }
        if self.max_block_size == 0 || self.max_block_size > i32::MAX as usize {
            return Err(HostError::setup(
                LoadStage::Setup,
                format!("invalid block size {}", self.max_block_size),
            ));
        }
        let ChannelLayout { inputs, outputs } = self.channels;
        if inputs > MAX_CHANNELS || outputs > MAX_CHANNELS {
            return Err(HostError::setup(
                LoadStage::Setup,
                format!("{inputs} in / {outputs} out exceeds {MAX_CHANNELS} channels per bus"),
            ));
        }
        Ok(())
    }
}

/// Result of one block call. Everything except `Processed` leaves the plugin untouched
/// or replaced by passthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Processed,
    /// Instance is not in `ProcessingReady` (or unknown).
    NotReady,
    /// A control thread is reconfiguring the instance; block skipped.
    Busy,
    /// Sample count or buffers do not fit the negotiated setup.
    Rejected,
    /// The plugin reported an error or faulted; outputs carry passthrough.
    PluginFault,
}

impl ProcessOutcome {
    pub fn is_processed(self) -> bool {
        self == ProcessOutcome::Processed
    }
}

/// Speaker arrangement with `channels` consecutive speakers.
pub fn arrangement_for(channels: usize) -> SpeakerArrangement {
    match channels {
        0 => 0,
        n if n >= MAX_CHANNELS => SpeakerArrangement::MAX,
        n => (1 << n) - 1,
    }
}

fn channels_in(arrangement: SpeakerArrangement) -> usize {
    arrangement.count_ones() as usize
}

/// Empty input event list; the host sends no note events.
pub struct HostEventList;

impl Class for HostEventList {
    type Interfaces = (IEventList,);
}

impl IEventListTrait for HostEventList {
    unsafe fn getEventCount(&self) -> int32 {
        0
    }

    unsafe fn getEvent(&self, _index: int32, _e: *mut Event) -> tresult {
        kResultFalse
    }

    unsafe fn addEvent(&self, _e: *mut Event) -> tresult {
        kResultFalse
    }
}

type BusChannels = SmallVec<[usize; 4]>;

/// Buses switched on during activation, switched off in reverse on teardown.
#[derive(Debug, Default)]
struct ActivatedBuses {
    buses: SmallVec<[(BusDirection, usize); 8]>,
}

impl ActivatedBuses {
    fn activate_all(&mut self, component: &Component, direction: BusDirection, count: usize) -> bool {
        for index in 0..count {
            if !component.activate_bus(kAudio as i32, direction, index, true) {
                tracing::warn!("Plugin refused to activate audio bus {direction}/{index}");
                return false;
            }
            self.buses.push((direction, index));
        }
        true
    }

    fn deactivate_all(&mut self, component: &Component) {
        while let Some((direction, index)) = self.buses.pop() {
            if !component.activate_bus(kAudio as i32, direction, index, false) {
                tracing::debug!("Bus {direction}/{index} did not deactivate cleanly");
            }
        }
    }
}

pub struct ProcessEngine {
    processor: ComPtr<IAudioProcessor>,
    context: ProcessingContext,
    main_inputs: usize,
    main_outputs: usize,
    input_scratch: Vec<Vec<f32>>,
    output_scratch: Vec<Vec<f32>>,
    /// Backs the channel pointers in `input_buses`.
    _input_ptrs: Vec<*mut f32>,
    output_ptrs: Vec<*mut f32>,
    input_buses: SmallVec<[AudioBusBuffers; 4]>,
    output_buses: SmallVec<[AudioBusBuffers; 4]>,
    param_changes: ComWrapper<HostParameterChanges>,
    output_changes: ComWrapper<HostParameterChanges>,
    /// Owns the object behind `events_ptr`.
    _events: ComWrapper<HostEventList>,
    param_changes_ptr: *mut IParameterChanges,
    output_changes_ptr: *mut IParameterChanges,
    events_ptr: *mut IEventList,
    transport: ProcessContext,
    activated: ActivatedBuses,
}

// SAFETY: the engine is moved between threads only while processing is stopped;
// the realtime slot hands it to one thread at a time.
unsafe impl Send for ProcessEngine {}

impl ProcessEngine {
    /// Negotiate `context` with the component and switch it on.
    /// On error every bus activated so far is switched off again.
    /// Buffers are allocated before the first bus goes live.
    pub fn activate(
        component: &Component,
        context: ProcessingContext,
        max_param_changes: usize,
    ) -> Result<Self> {
        context.validate()?;
        let processor = component.processor().clone();

        if unsafe { processor.canProcessSampleSize(kSample32 as i32) } != kResultOk {
            return Err(HostError::setup(
                LoadStage::Setup,
                "32-bit float processing not supported",
            ));
        }

        let (inputs, outputs) = negotiate_arrangement(component, &processor, &context);

        let mut setup = ProcessSetup {
            processMode: kRealtime as i32,
            symbolicSampleSize: kSample32 as i32,
            maxSamplesPerBlock: context.max_block_size as i32,
            sampleRate: context.sample_rate,
        };
        let result = unsafe { processor.setupProcessing(&mut setup) };
        if result != kResultOk {
            return Err(HostError::setup(
                LoadStage::Setup,
                format!(
                    "setupProcessing refused {} Hz / {} samples (code {result:#x})",
                    context.sample_rate, context.max_block_size
                ),
            ));
        }

        let mut engine = Self::build(processor, context, &inputs, &outputs, max_param_changes)?;

        let buses_on = engine.activated.activate_all(component, kInput as i32, inputs.len())
            && engine.activated.activate_all(component, kOutput as i32, outputs.len());
        if !buses_on {
            engine.activated.deactivate_all(component);
            return Err(HostError::setup(LoadStage::Activation, "bus activation refused"));
        }

        if !component.set_active(true) {
            engine.activated.deactivate_all(component);
            return Err(HostError::setup(LoadStage::Activation, "setActive refused"));
        }

        let result = unsafe { engine.processor.setProcessing(1) };
        if result != kResultOk && result != kNotImplemented {
            tracing::warn!("setProcessing(true) returned {result:#x}, continuing");
        }

        tracing::info!(
            "Processing ready: {} Hz, {} samples, {} in / {} out buses",
            context.sample_rate,
            context.max_block_size,
            inputs.len(),
            outputs.len()
        );
        Ok(engine)
    }

    fn build(
        processor: ComPtr<IAudioProcessor>,
        context: ProcessingContext,
        inputs: &BusChannels,
        outputs: &BusChannels,
        max_param_changes: usize,
    ) -> Result<Self> {
        let block = context.max_block_size;
        let total_in: usize = inputs.iter().sum();
        let total_out: usize = outputs.iter().sum();

        let mut input_scratch: Vec<Vec<f32>> = (0..total_in).map(|_| vec![0.0; block]).collect();
        let mut output_scratch: Vec<Vec<f32>> = (0..total_out).map(|_| vec![0.0; block]).collect();
        let mut input_ptrs: Vec<*mut f32> = input_scratch.iter_mut().map(|b| b.as_mut_ptr()).collect();
        let mut output_ptrs: Vec<*mut f32> =
            output_scratch.iter_mut().map(|b| b.as_mut_ptr()).collect();

        let input_buses = bus_buffers(inputs, &mut input_ptrs);
        let output_buses = bus_buffers(outputs, &mut output_ptrs);

        let param_changes = ComWrapper::new(HostParameterChanges::with_capacity(max_param_changes));
        let output_changes = ComWrapper::new(HostParameterChanges::with_capacity(max_param_changes));
        let events = ComWrapper::new(HostEventList);

        let missing = || HostError::InterfaceNotFound {
            interface: "IParameterChanges",
        };
        let param_changes_ptr = param_changes
            .as_com_ref::<IParameterChanges>()
            .ok_or_else(missing)?
            .as_ptr();
        let output_changes_ptr = output_changes
            .as_com_ref::<IParameterChanges>()
            .ok_or_else(missing)?
            .as_ptr();
        let events_ptr = events
            .as_com_ref::<IEventList>()
            .ok_or(HostError::InterfaceNotFound {
                interface: "IEventList",
            })?
            .as_ptr();

        let mut transport: ProcessContext = unsafe { std::mem::zeroed() };
        transport.state = kTempoValid | kTimeSigValid;
        transport.sampleRate = context.sample_rate;
        transport.tempo = 120.0;
        transport.timeSigNumerator = 4;
        transport.timeSigDenominator = 4;

        Ok(Self {
            processor,
            context,
            main_inputs: inputs.first().copied().unwrap_or(0),
            main_outputs: outputs.first().copied().unwrap_or(0),
            input_scratch,
            output_scratch,
            _input_ptrs: input_ptrs,
            output_ptrs,
            input_buses,
            output_buses,
            param_changes,
            output_changes,
            _events: events,
            param_changes_ptr,
            output_changes_ptr,
            events_ptr,
            transport,
            activated: ActivatedBuses::default(),
        })
    }

    pub fn context(&self) -> &ProcessingContext {
        &self.context
    }

    /// Channels of the main input and output bus as finally negotiated.
    pub fn main_channels(&self) -> ChannelLayout {
        ChannelLayout::new(self.main_inputs, self.main_outputs)
    }

    /// Run one block. `inputs`/`outputs` are per-channel slices for the main buses;
    /// missing channels read silence and surplus output channels are zeroed.
    pub fn process(
        &mut self,
        edits: &ParamQueue,
        inputs: &[&[f32]],
        outputs: &mut [&mut [f32]],
        num_samples: usize,
    ) -> ProcessOutcome {
        if num_samples == 0 || num_samples > self.context.max_block_size {
            return ProcessOutcome::Rejected;
        }
        if inputs.iter().any(|ch| ch.len() < num_samples)
            || outputs.iter().any(|ch| ch.len() < num_samples)
        {
            return ProcessOutcome::Rejected;
        }

        self.param_changes.clear();
        self.param_changes.fill_from(edits);
        self.output_changes.clear();

        // Plugins may process in place, so inputs always go through scratch.
        for (ch, scratch) in self.input_scratch.iter_mut().enumerate() {
            let dst = &mut scratch[..num_samples];
            match inputs.get(ch).filter(|_| ch < self.main_inputs) {
                Some(src) => dst.copy_from_slice(&src[..num_samples]),
                None => dst.fill(0.0),
            }
        }

        for (ch, ptr) in self.output_ptrs.iter_mut().enumerate() {
            *ptr = match outputs.get_mut(ch).filter(|_| ch < self.main_outputs) {
                Some(out) => out.as_mut_ptr(),
                None => self.output_scratch[ch].as_mut_ptr(),
            };
        }
        rebind(&mut self.output_buses, &mut self.output_ptrs);

        let mut data = ProcessData {
            processMode: kRealtime as i32,
            symbolicSampleSize: kSample32 as i32,
            numSamples: num_samples as i32,
            numInputs: self.input_buses.len() as i32,
            numOutputs: self.output_buses.len() as i32,
            inputs: bus_ptr(&mut self.input_buses),
            outputs: bus_ptr(&mut self.output_buses),
            inputParameterChanges: self.param_changes_ptr,
            outputParameterChanges: self.output_changes_ptr,
            inputEvents: self.events_ptr,
            outputEvents: std::ptr::null_mut(),
            processContext: &mut self.transport,
        };

        let processor = &self.processor;
        let result = panic::catch_unwind(AssertUnwindSafe(|| unsafe {
            processor.process(&mut data)
        }));

        self.transport.projectTimeSamples += num_samples as i64;

        match result {
            Ok(code) if code == kResultOk => {
                for out in outputs.iter_mut().skip(self.main_outputs) {
                    out[..num_samples].fill(0.0);
                }
                ProcessOutcome::Processed
            }
            _ => {
                passthrough(inputs, outputs, num_samples);
                ProcessOutcome::PluginFault
            }
        }
    }

    /// Stop processing and switch the component off. Leaves it `Loaded`.
    pub fn deactivate(mut self, component: &Component) {
        let result = unsafe { self.processor.setProcessing(0) };
        if result != kResultOk && result != kNotImplemented {
            tracing::debug!("setProcessing(false) returned {result:#x}");
        }
        if !component.set_active(false) {
            tracing::warn!("Plugin refused setActive(false)");
        }
        self.activated.deactivate_all(component);
        tracing::info!("Processing stopped");
    }
}

/// Try the requested main-bus layout; on refusal fall back to whatever the plugin reports.
fn negotiate_arrangement(
    component: &Component,
    processor: &ComPtr<IAudioProcessor>,
    context: &ProcessingContext,
) -> (BusChannels, BusChannels) {
    let declared = |direction: BusDirection, main: usize| -> BusChannels {
        (0..component.bus_count(kAudio as i32, direction))
            .map(|index| match index {
                0 => main,
                _ => component
                    .bus_info(kAudio as i32, direction, index)
                    .map(|bus| bus.channels.min(MAX_CHANNELS))
                    .unwrap_or(0),
            })
            .collect()
    };
    let inputs = declared(kInput as i32, context.channels.inputs);
    let outputs = declared(kOutput as i32, context.channels.outputs);

    let mut in_arr: SmallVec<[SpeakerArrangement; 4]> = inputs.iter().map(|&n| arrangement_for(n)).collect();
    let mut out_arr: SmallVec<[SpeakerArrangement; 4]> =
        outputs.iter().map(|&n| arrangement_for(n)).collect();

    let result = unsafe {
        processor.setBusArrangements(
            in_arr.as_mut_ptr(),
            in_arr.len() as i32,
            out_arr.as_mut_ptr(),
            out_arr.len() as i32,
        )
    };
    if result == kResultOk {
        return (inputs, outputs);
    }

    tracing::warn!(
        "Plugin refused {} in / {} out, using its own arrangement",
        context.channels.inputs,
        context.channels.outputs
    );
    let current = |direction: BusDirection, requested: &BusChannels| -> BusChannels {
        requested
            .iter()
            .enumerate()
            .map(|(index, &fallback)| {
                let mut arr: SpeakerArrangement = 0;
                let result = unsafe { processor.getBusArrangement(direction, index as i32, &mut arr) };
                if result == kResultOk {
                    channels_in(arr)
                } else {
                    component
                        .bus_info(kAudio as i32, direction, index)
                        .map(|bus| bus.channels.min(MAX_CHANNELS))
                        .unwrap_or(fallback)
                }
            })
            .collect()
    };
    (current(kInput as i32, &inputs), current(kOutput as i32, &outputs))
}

fn bus_buffers(channels: &BusChannels, ptrs: &mut [*mut f32]) -> SmallVec<[AudioBusBuffers; 4]> {
    let mut buses: SmallVec<[AudioBusBuffers; 4]> = channels
        .iter()
        .map(|&count| AudioBusBuffers {
            numChannels: count as i32,
            silenceFlags: 0,
            __field0: AudioBusBuffers__type0 {
                channelBuffers32: std::ptr::null_mut(),
            },
        })
        .collect();
    rebind(&mut buses, ptrs);
    buses
}

/// Point each bus at its slice of the flat channel pointer array.
fn rebind(buses: &mut [AudioBusBuffers], ptrs: &mut [*mut f32]) {
    let mut offset = 0;
    for bus in buses.iter_mut() {
        let count = bus.numChannels.max(0) as usize;
        bus.silenceFlags = 0;
        bus.__field0.channelBuffers32 = if count == 0 {
            std::ptr::null_mut()
        } else {
            ptrs[offset..].as_mut_ptr()
        };
        offset += count;
    }
}

fn bus_ptr(buses: &mut [AudioBusBuffers]) -> *mut AudioBusBuffers {
    if buses.is_empty() {
        std::ptr::null_mut()
    } else {
        buses.as_mut_ptr()
    }
}

fn passthrough(inputs: &[&[f32]], outputs: &mut [&mut [f32]], num_samples: usize) {
    for (ch, out) in outputs.iter_mut().enumerate() {
        let out = &mut out[..num_samples];
        match inputs.get(ch) {
            Some(src) => out.copy_from_slice(&src[..num_samples]),
            None => out.fill(0.0),
        }
    }
}
