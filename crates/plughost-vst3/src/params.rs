//! Parameter bridge: controller reads/writes and per-block parameter delivery.

use std::cell::UnsafeCell;

use crossbeam::queue::ArrayQueue;
use vst3::Steinberg::Vst::{
    IEditControllerTrait as _, IParamValueQueue, IParamValueQueueTrait, IParameterChanges,
    IParameterChangesTrait, ParamID, ParamValue, ParameterInfo as Vst3ParameterInfo, String128,
};
use vst3::Steinberg::{int32, kInvalidArgument, kResultOk, tresult};
use vst3::{Class, ComWrapper};

use crate::component::Controller;
use crate::metadata::{ParameterFlags, ParameterInfo};
use crate::util::utf16_to_string;

/// A normalized value headed for the processor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamChange {
    pub id: u32,
    pub value: f64,
}

impl ParamChange {
    pub fn new(id: u32, value: f64) -> Self {
        Self { id, value }
    }
}

/// Bounded queue between control threads and the audio thread.
pub type ParamQueue = ArrayQueue<ParamChange>;

impl Controller {
    /// Forwards as-is; the plugin decides what out-of-range values mean.
    pub fn set_normalized(&self, id: u32, value: f64) -> bool {
        unsafe { self.edit_controller().setParamNormalized(id, value) == kResultOk }
    }

    pub fn normalized(&self, id: u32) -> f64 {
        unsafe { self.edit_controller().getParamNormalized(id) }
    }

    pub fn parameter_count(&self) -> usize {
        let count = unsafe { self.edit_controller().getParameterCount() };
        count.max(0) as usize
    }

    pub fn parameter_info(&self, index: usize) -> Option<ParameterInfo> {
        let mut raw: Vst3ParameterInfo = unsafe { std::mem::zeroed() };
        let result = unsafe {
            self.edit_controller()
                .getParameterInfo(index as int32, &mut raw)
        };
        if result != kResultOk {
            return None;
        }
        Some(ParameterInfo {
            id: raw.id,
            name: utf16_to_string(&raw.title),
            short_name: utf16_to_string(&raw.shortTitle),
            unit: utf16_to_string(&raw.units),
            default_value: raw.defaultNormalizedValue,
            step_count: raw.stepCount.max(0) as u32,
            flags: ParameterFlags::from_vst3(raw.flags),
        })
    }

    /// Enumerates every declared parameter, skipping indices the plugin refuses.
    pub fn parameters(&self) -> Vec<ParameterInfo> {
        (0..self.parameter_count())
            .filter_map(|index| self.parameter_info(index))
            .collect()
    }

    /// Plugin-formatted display string for a normalized value.
    pub fn value_to_string(&self, id: u32, value: f64) -> Option<String> {
        let mut text: String128 = [0; 128];
        let result = unsafe {
            self.edit_controller()
                .getParamStringByValue(id, value, &mut text)
        };
        (result == kResultOk).then(|| utf16_to_string(&text))
    }
}

// ============================================================================
// Process-time parameter changes
// ============================================================================

/// Single-point queue; the latest value in a block wins.
pub struct HostParamValueQueue {
    param_id: UnsafeCell<ParamID>,
    value: UnsafeCell<ParamValue>,
}

impl Class for HostParamValueQueue {
    type Interfaces = (IParamValueQueue,);
}

impl IParamValueQueueTrait for HostParamValueQueue {
    unsafe fn getParameterId(&self) -> ParamID {
        unsafe { *self.param_id.get() }
    }

    unsafe fn getPointCount(&self) -> int32 {
        1
    }

    unsafe fn getPoint(
        &self,
        index: int32,
        sample_offset: *mut int32,
        value: *mut ParamValue,
    ) -> tresult {
        if index != 0 || sample_offset.is_null() || value.is_null() {
            return kInvalidArgument;
        }
        unsafe {
            *sample_offset = 0;
            *value = *self.value.get();
        }
        kResultOk
    }

    unsafe fn addPoint(&self, _sample_offset: int32, value: ParamValue, index: *mut int32) -> tresult {
        unsafe {
            *self.value.get() = value;
            if !index.is_null() {
                *index = 0;
            }
        }
        kResultOk
    }
}

/// Preallocated `IParameterChanges`; filling and clearing never allocate.
pub struct HostParameterChanges {
    count: UnsafeCell<usize>,
    queues: Vec<ComWrapper<HostParamValueQueue>>,
}

impl HostParameterChanges {
    pub fn with_capacity(capacity: usize) -> Self {
        let queues = (0..capacity)
            .map(|_| {
                ComWrapper::new(HostParamValueQueue {
                    param_id: UnsafeCell::new(0),
                    value: UnsafeCell::new(0.0),
                })
            })
            .collect();
        Self {
            count: UnsafeCell::new(0),
            queues,
        }
    }

    pub fn len(&self) -> usize {
        unsafe { *self.count.get() }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        unsafe { *self.count.get() = 0 };
    }

    /// Returns false when every slot is taken by another parameter.
    pub fn push(&self, change: ParamChange) -> bool {
        let count = self.len();
        for queue in &self.queues[..count] {
            if unsafe { *queue.param_id.get() } == change.id {
                unsafe { *queue.value.get() = change.value };
                return true;
            }
        }
        let Some(queue) = self.queues.get(count) else {
            return false;
        };
        unsafe {
            *queue.param_id.get() = change.id;
            *queue.value.get() = change.value;
            *self.count.get() = count + 1;
        }
        true
    }

    /// Drains as many queued changes as fit into this block.
    pub fn fill_from(&self, source: &ParamQueue) {
        while self.len() < self.queues.len() {
            let Some(change) = source.pop() else {
                break;
            };
            self.push(change);
        }
    }

    fn queue_ptr(&self, index: usize) -> *mut IParamValueQueue {
        self.queues
            .get(index)
            .and_then(|q| q.as_com_ref::<IParamValueQueue>())
            .map(|r| r.as_ptr())
            .unwrap_or(std::ptr::null_mut())
    }
}

impl Class for HostParameterChanges {
    type Interfaces = (IParameterChanges,);
}

impl IParameterChangesTrait for HostParameterChanges {
    unsafe fn getParameterCount(&self) -> int32 {
        self.len() as int32
    }

    unsafe fn getParameterData(&self, index: int32) -> *mut IParamValueQueue {
        if index < 0 || index as usize >= self.len() {
            return std::ptr::null_mut();
        }
        self.queue_ptr(index as usize)
    }

    unsafe fn addParameterData(&self, id: *const ParamID, index: *mut int32) -> *mut IParamValueQueue {
        if id.is_null() {
            return std::ptr::null_mut();
        }
        let id = unsafe { *id };
        let existing = self.queues[..self.len()]
            .iter()
            .position(|q| unsafe { *q.param_id.get() } == id);
        let slot = match existing {
            Some(slot) => slot,
            None if self.push(ParamChange::new(id, 0.0)) => self.len() - 1,
            None => return std::ptr::null_mut(),
        };
        if !index.is_null() {
            unsafe { *index = slot as int32 };
        }
        self.queue_ptr(slot)
    }
}
