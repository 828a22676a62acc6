//! Class enumeration and selection on a plugin factory.

use std::ffi::c_void;

use vst3::Steinberg::{
    kNoInterface, kResultOk, IPluginFactory, IPluginFactory2, IPluginFactory2Trait as _,
    IPluginFactoryTrait as _, PClassInfo, PClassInfo2, PFactoryInfo, TUID,
};
use vst3::{ComPtr, Interface};

use crate::error::{HostError, LoadStage, Result};
use crate::util::{c_chars_to_string, guid_to_tuid, tuid_to_bytes};

const AUDIO_EFFECT_CATEGORY: &str = "Audio Module Class";
const CONTROLLER_CATEGORY: &str = "Component Controller Class";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassCategory {
    AudioEffect,
    Controller,
    Other(String),
}

impl ClassCategory {
    pub fn parse(category: &str) -> Self {
        match category {
            AUDIO_EFFECT_CATEGORY => ClassCategory::AudioEffect,
            CONTROLLER_CATEGORY => ClassCategory::Controller,
            other => ClassCategory::Other(other.to_string()),
        }
    }
}

/// One class declared by a factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor {
    pub cid: [u8; 16],
    pub category: ClassCategory,
    pub name: String,
}

impl ClassDescriptor {
    fn from_raw(info: &PClassInfo) -> Self {
        Self {
            cid: tuid_to_bytes(&info.cid),
            category: ClassCategory::parse(&c_chars_to_string(&info.category)),
            name: c_chars_to_string(&info.name),
        }
    }

    pub fn tuid(&self) -> TUID {
        guid_to_tuid(&self.cid)
    }
}

/// `PClassInfo2` fields, when the factory provides them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassDetails {
    pub sub_categories: String,
    pub vendor: String,
    pub version: String,
}

/// Borrowed view of a module's factory. Only valid while the module is loaded.
pub struct PluginFactory<'a> {
    factory: &'a ComPtr<IPluginFactory>,
}

impl<'a> PluginFactory<'a> {
    pub fn new(factory: &'a ComPtr<IPluginFactory>) -> Self {
        Self { factory }
    }

    pub fn class_count(&self) -> usize {
        unsafe { self.factory.countClasses() }.max(0) as usize
    }

    /// Lazily reads indices `0..count`. Call again to restart.
    pub fn classes(&self) -> ClassIter<'_> {
        ClassIter {
            factory: self.factory,
            index: 0,
            count: self.class_count(),
        }
    }

    pub fn vendor(&self) -> Option<String> {
        let mut info: PFactoryInfo = unsafe { std::mem::zeroed() };
        if unsafe { self.factory.getFactoryInfo(&mut info) } != kResultOk {
            return None;
        }
        let vendor = c_chars_to_string(&info.vendor);
        (!vendor.is_empty()).then_some(vendor)
    }

    /// Extended info for the class with `cid`, if the factory implements `IPluginFactory2`.
    pub fn details(&self, cid: &[u8; 16]) -> Option<ClassDetails> {
        let factory2 = self.factory.cast::<IPluginFactory2>()?;
        (0..self.class_count()).find_map(|index| {
            let mut info: PClassInfo2 = unsafe { std::mem::zeroed() };
            let result = unsafe { factory2.getClassInfo2(index as i32, &mut info) };
            (result == kResultOk && tuid_to_bytes(&info.cid) == *cid).then(|| ClassDetails {
                sub_categories: c_chars_to_string(&info.subCategories),
                vendor: c_chars_to_string(&info.vendor),
                version: c_chars_to_string(&info.version),
            })
        })
    }

    /// First audio-effect class in enumeration order.
    pub fn audio_class(&self) -> Option<ClassDescriptor> {
        self.classes()
            .find(|class| class.category == ClassCategory::AudioEffect)
    }

    /// First class declared as a controller.
    pub fn controller_class(&self) -> Option<ClassDescriptor> {
        self.classes()
            .find(|class| class.category == ClassCategory::Controller)
    }

    /// Create `cid` and ask the new object for `I`. Ownership of the reference
    /// returned by the factory moves into the `ComPtr`.
    pub fn create<I: Interface>(&self, cid: &TUID, interface: &'static str) -> Result<ComPtr<I>> {
        let iid = guid_to_tuid(&I::IID);
        let mut obj: *mut c_void = std::ptr::null_mut();
        let result = unsafe { self.factory.createInstance(cid.as_ptr(), iid.as_ptr(), &mut obj) };
        if result != kResultOk {
            // A non-null object on failure is still ours to release.
            drop(unsafe { ComPtr::<I>::from_raw(obj as *mut I) });
            return Err(if result == kNoInterface {
                HostError::InterfaceNotFound { interface }
            } else {
                HostError::Init {
                    stage: LoadStage::Instantiation,
                    code: result,
                }
            });
        }
        unsafe { ComPtr::from_raw(obj as *mut I) }.ok_or(HostError::InterfaceNotFound { interface })
    }
}

pub struct ClassIter<'a> {
    factory: &'a ComPtr<IPluginFactory>,
    index: usize,
    count: usize,
}

impl Iterator for ClassIter<'_> {
    type Item = ClassDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.count {
            let index = self.index;
            self.index += 1;
            let mut info: PClassInfo = unsafe { std::mem::zeroed() };
            if unsafe { self.factory.getClassInfo(index as i32, &mut info) } == kResultOk {
                return Some(ClassDescriptor::from_raw(&info));
            }
            tracing::debug!("Factory refused class info for index {index}");
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.count - self.index))
    }
}
