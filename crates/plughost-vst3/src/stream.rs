//! In-memory `IBStream` used to hand component state to the controller.

use std::cell::UnsafeCell;
use std::ffi::c_void;

use vst3::Steinberg::IBStream_::IStreamSeekMode_::{kIBSeekCur, kIBSeekEnd, kIBSeekSet};
use vst3::Steinberg::{int32, int64, kInvalidArgument, kResultOk, tresult, IBStream, IBStreamTrait};
use vst3::{Class, ComPtr, ComWrapper};

pub struct MemoryStream {
    data: UnsafeCell<Vec<u8>>,
    position: UnsafeCell<usize>,
}

impl MemoryStream {
    pub fn empty() -> ComWrapper<Self> {
        ComWrapper::new(Self {
            data: UnsafeCell::new(Vec::new()),
            position: UnsafeCell::new(0),
        })
    }

    pub fn len(&self) -> usize {
        unsafe { (*self.data.get()).len() }
    }

    pub fn rewind(&self) {
        unsafe { *self.position.get() = 0 };
    }

    pub fn as_stream(wrapper: &ComWrapper<Self>) -> Option<ComPtr<IBStream>> {
        wrapper.to_com_ptr::<IBStream>()
    }
}

impl Class for MemoryStream {
    type Interfaces = (IBStream,);
}

impl IBStreamTrait for MemoryStream {
    unsafe fn read(&self, buffer: *mut c_void, num_bytes: int32, num_bytes_read: *mut int32) -> tresult {
        if buffer.is_null() || num_bytes < 0 {
            return kInvalidArgument;
        }
        let data = unsafe { &*self.data.get() };
        let position = unsafe { &mut *self.position.get() };
        let available = data.len().saturating_sub(*position);
        let count = available.min(num_bytes as usize);
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr().add(*position), buffer as *mut u8, count);
        }
        *position += count;
        if !num_bytes_read.is_null() {
            unsafe { *num_bytes_read = count as int32 };
        }
        kResultOk
    }

    unsafe fn write(
        &self,
        buffer: *mut c_void,
        num_bytes: int32,
        num_bytes_written: *mut int32,
    ) -> tresult {
        if buffer.is_null() || num_bytes < 0 {
            return kInvalidArgument;
        }
        let data = unsafe { &mut *self.data.get() };
        let position = unsafe { &mut *self.position.get() };
        let bytes = unsafe { std::slice::from_raw_parts(buffer as *const u8, num_bytes as usize) };
        let end = *position + bytes.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[*position..end].copy_from_slice(bytes);
        *position = end;
        if !num_bytes_written.is_null() {
            unsafe { *num_bytes_written = num_bytes };
        }
        kResultOk
    }

    unsafe fn seek(&self, pos: int64, mode: int32, result: *mut int64) -> tresult {
        let len = self.len() as int64;
        let current = unsafe { *self.position.get() } as int64;
        let target = match mode as u32 {
            m if m == kIBSeekSet as u32 => pos,
            m if m == kIBSeekCur as u32 => current + pos,
            m if m == kIBSeekEnd as u32 => len + pos,
            _ => return kInvalidArgument,
        };
        if target < 0 {
            return kInvalidArgument;
        }
        unsafe { *self.position.get() = target as usize };
        if !result.is_null() {
            unsafe { *result = target };
        }
        kResultOk
    }

    unsafe fn tell(&self, pos: *mut int64) -> tresult {
        if pos.is_null() {
            return kInvalidArgument;
        }
        unsafe { *pos = *self.position.get() as int64 };
        kResultOk
    }
}
