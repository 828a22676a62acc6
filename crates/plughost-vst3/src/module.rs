//! Loading plugin binaries and owning their lifetime.
//!
//! A [`PluginModule`] owns the library handle and the factory obtained from it.
//! Every object created through the factory must be released before the module
//! drops; field order below guarantees the factory goes first and the library last.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vst3::ComPtr;
use vst3::Steinberg::IPluginFactory;

use crate::error::{HostError, LoadStage, Result};

#[cfg(target_os = "macos")]
const ENTRY_SYMBOL: &[u8] = b"bundleEntry\0";
#[cfg(target_os = "macos")]
const EXIT_SYMBOL: &[u8] = b"bundleExit\0";

#[cfg(windows)]
const ENTRY_SYMBOL: &[u8] = b"InitDll\0";
#[cfg(windows)]
const EXIT_SYMBOL: &[u8] = b"ExitDll\0";

#[cfg(not(any(target_os = "macos", windows)))]
const ENTRY_SYMBOL: &[u8] = b"ModuleEntry\0";
#[cfg(not(any(target_os = "macos", windows)))]
const EXIT_SYMBOL: &[u8] = b"ModuleExit\0";

const FACTORY_SYMBOL: &[u8] = b"GetPluginFactory\0";

#[cfg(windows)]
type EntryFn = unsafe extern "system" fn() -> bool;
#[cfg(not(windows))]
type EntryFn = unsafe extern "C" fn(*mut c_void) -> bool;

#[cfg(windows)]
type ExitFn = unsafe extern "system" fn() -> bool;
#[cfg(not(windows))]
type ExitFn = unsafe extern "C" fn() -> bool;

type GetFactoryFn = unsafe extern "system" fn() -> *mut IPluginFactory;

/// Map `binary` and return the handle its entry point expects: the `dlopen`
/// handle on Linux. macOS gets null in place of a `CFBundleRef`.
#[cfg(all(unix, not(target_os = "macos")))]
fn open(binary: &Path) -> std::result::Result<(libloading::Library, *mut c_void), libloading::Error> {
    use libloading::os::unix::Library;

    let handle = unsafe { Library::new(binary) }?.into_raw();
    let library = unsafe { Library::from_raw(handle) };
    Ok((library.into(), handle))
}

#[cfg(not(all(unix, not(target_os = "macos"))))]
fn open(binary: &Path) -> std::result::Result<(libloading::Library, *mut c_void), libloading::Error> {
    let library = unsafe { libloading::Library::new(binary) }?;
    Ok((library, std::ptr::null_mut()))
}

fn symbol_name(symbol: &[u8]) -> String {
    String::from_utf8_lossy(symbol.strip_suffix(b"\0").unwrap_or(symbol)).into_owned()
}

/// Counts modules that are still mapped. Shared by every module a host loads.
#[derive(Clone, Debug, Default)]
pub struct ResidencyTracker {
    resident: Arc<AtomicUsize>,
}

impl ResidencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resident(&self) -> usize {
        self.resident.load(Ordering::Acquire)
    }

    fn enter(&self) -> Residency {
        self.resident.fetch_add(1, Ordering::AcqRel);
        Residency {
            tracker: self.clone(),
        }
    }
}

/// Decrements on drop. Declared after the library so the count only falls once it is unmapped.
#[derive(Debug)]
struct Residency {
    tracker: ResidencyTracker,
}

impl Drop for Residency {
    fn drop(&mut self) {
        self.tracker.resident.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A loaded plugin binary with its factory.
pub struct PluginModule {
    path: PathBuf,
    factory: Option<ComPtr<IPluginFactory>>,
    exit: Option<ExitFn>,
    library: Option<libloading::Library>,
    residency: Option<Residency>,
}

// SAFETY: the factory pointer is only used from control threads, serialized by the registry.
unsafe impl Send for PluginModule {}

impl PluginModule {
    /// Map the binary at `path` (a shared library or a `.vst3` bundle), run its entry
    /// point and fetch its factory. Nothing stays mapped on any error path.
    pub fn load(path: &Path) -> Result<Self> {
        let binary = resolve_binary(path);
        tracing::debug!("Loading VST3 module {}", binary.display());

        let (library, handle) = open(&binary).map_err(|e| HostError::Load {
            path: path.to_path_buf(),
            stage: LoadStage::Opening,
            reason: e.to_string(),
        })?;

        let missing = |symbol: &[u8]| HostError::InvalidPlugin {
            path: path.to_path_buf(),
            reason: format!("missing entry point `{}`", symbol_name(symbol)),
        };

        // Copy the raw fn pointers out; the library is kept alive alongside them.
        let entry: EntryFn = unsafe { library.get::<EntryFn>(ENTRY_SYMBOL) }
            .map(|s| *s)
            .map_err(|_| missing(ENTRY_SYMBOL))?;
        let get_factory: GetFactoryFn = unsafe { library.get::<GetFactoryFn>(FACTORY_SYMBOL) }
            .map(|s| *s)
            .map_err(|_| missing(FACTORY_SYMBOL))?;
        let exit: Option<ExitFn> = unsafe { library.get::<ExitFn>(EXIT_SYMBOL) }
            .ok()
            .map(|s| *s);

        #[cfg(windows)]
        let entered = {
            let _ = handle;
            unsafe { entry() }
        };
        #[cfg(not(windows))]
        let entered = unsafe { entry(handle) };
        if !entered {
            return Err(HostError::Init {
                stage: LoadStage::ModuleEntry,
                code: 0,
            });
        }

        let mut module = Self {
            path: path.to_path_buf(),
            factory: None,
            exit,
            library: Some(library),
            residency: None,
        };

        // From here on, dropping `module` runs the exit hook and unloads.
        let factory = unsafe { ComPtr::from_raw(get_factory()) }.ok_or(HostError::Init {
            stage: LoadStage::Factory,
            code: 0,
        })?;
        module.factory = Some(factory);

        tracing::info!("Loaded VST3 module {}", path.display());
        Ok(module)
    }

    /// Wrap a factory that is already resident (statically linked plugins, tests).
    pub fn from_factory(path: impl Into<PathBuf>, factory: ComPtr<IPluginFactory>) -> Self {
        Self {
            path: path.into(),
            factory: Some(factory),
            exit: None,
            library: None,
            residency: None,
        }
    }

    /// Count this module in `tracker` until it drops.
    pub fn track(mut self, tracker: &ResidencyTracker) -> Self {
        if self.residency.is_none() {
            self.residency = Some(tracker.enter());
        }
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn factory(&self) -> Result<&ComPtr<IPluginFactory>> {
        self.factory.as_ref().ok_or(HostError::Init {
            stage: LoadStage::Factory,
            code: 0,
        })
    }

    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }
}

impl Drop for PluginModule {
    fn drop(&mut self) {
        self.factory.take();
        if let Some(exit) = self.exit.take() {
            if !unsafe { exit() } {
                tracing::warn!("Module exit reported failure: {}", self.path.display());
            }
        }
        if self.library.take().is_some() {
            tracing::debug!("Unloaded VST3 module {}", self.path.display());
        }
        self.residency.take();
    }
}

/// Resolve a `.vst3` bundle directory to the binary for this platform.
/// Plain files are returned unchanged.
pub fn resolve_binary(path: &Path) -> PathBuf {
    if !path.is_dir() {
        return path.to_path_buf();
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let contents = path.join("Contents");

    #[cfg(target_os = "macos")]
    {
        contents.join("MacOS").join(stem)
    }

    #[cfg(windows)]
    {
        contents
            .join(format!("{}-win", bundle_arch()))
            .join(format!("{stem}.vst3"))
    }

    #[cfg(not(any(target_os = "macos", windows)))]
    {
        contents
            .join(format!("{}-linux", bundle_arch()))
            .join(format!("{stem}.so"))
    }
}

#[cfg_attr(target_os = "macos", allow(dead_code))]
fn bundle_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "x86",
        "aarch64" if cfg!(windows) => "arm64",
        "aarch64" => "aarch64",
        "arm" => "armv7l",
        _ => "x86_64",
    }
}
