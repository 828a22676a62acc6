//! Plugin editor views and the windows they live in.

use vst3::Steinberg::{kResultOk, IPlugView, IPlugViewTrait as _, ViewRect};
use vst3::Steinberg::Vst::IEditControllerTrait as _;
use vst3::ComPtr;

use crate::component::Controller;
use crate::error::{HostError, Result};
use crate::metadata::PluginId;
use crate::window::{NativeWindow, ViewSize, WindowHandle, WindowSystem};

const EDITOR_VIEW: &std::ffi::CStr = c"editor";

/// Where a view is attached.
#[derive(Debug)]
enum EditorWindow {
    /// Caller-owned; never destroyed here.
    Embedded(WindowHandle),
    /// Created by the window system; destroyed on close.
    Owned(NativeWindow),
}

/// An attached editor view. Exists exactly while the editor is visible.
pub struct EditorSession {
    view: ComPtr<IPlugView>,
    window: EditorWindow,
    size: ViewSize,
}

// SAFETY: views are only touched from control threads under the registry lock.
unsafe impl Send for EditorSession {}

/// Everything needed to open an editor for one instance.
pub struct EditorRequest<'a> {
    pub owner: &'a PluginId,
    pub title: String,
    pub parent: Option<WindowHandle>,
    pub default_size: ViewSize,
}

impl EditorSession {
    /// Create and attach the plugin's editor view.
    ///
    /// `Ok(None)` means the plugin has no editor for this platform; the view is
    /// released and no window is created. Host-side failures are errors.
    pub fn open(
        controller: &Controller,
        request: EditorRequest<'_>,
        windows: &mut dyn WindowSystem,
    ) -> Result<Option<Self>> {
        let raw = unsafe { controller.edit_controller().createView(EDITOR_VIEW.as_ptr()) };
        let Some(view) = (unsafe { ComPtr::from_raw(raw) }) else {
            tracing::info!("Plugin {} provides no editor view", request.owner);
            return Ok(None);
        };

        let platform = request
            .parent
            .map(|parent| parent.platform)
            .unwrap_or_else(crate::window::PlatformType::native);
        if unsafe { view.isPlatformTypeSupported(platform.as_cstr().as_ptr()) } != kResultOk {
            tracing::info!("Editor of {} does not support {platform}", request.owner);
            return Ok(None);
        }

        let size = preferred_size(&view).unwrap_or(request.default_size);

        let window = match request.parent {
            Some(parent) => EditorWindow::Embedded(parent),
            None => EditorWindow::Owned(windows.create_window(request.owner, &request.title, size)?),
        };
        let handle = match &window {
            EditorWindow::Embedded(handle) => *handle,
            EditorWindow::Owned(native) => native.handle,
        };

        let result = unsafe { view.attached(handle.as_ptr(), platform.as_cstr().as_ptr()) };
        if result != kResultOk {
            if let EditorWindow::Owned(native) = window {
                windows.destroy_window(native);
            }
            return Err(HostError::Editor(format!(
                "view refused to attach to {platform} window (code {result:#x})"
            )));
        }

        tracing::info!(
            "Opened editor for {} ({}x{}, {})",
            request.owner,
            size.width,
            size.height,
            if request.parent.is_some() { "embedded" } else { "own window" }
        );
        Ok(Some(Self { view, window, size }))
    }

    pub fn size(&self) -> ViewSize {
        self.size
    }

    pub fn window(&self) -> WindowHandle {
        match &self.window {
            EditorWindow::Embedded(handle) => *handle,
            EditorWindow::Owned(native) => native.handle,
        }
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.window, EditorWindow::Embedded(_))
    }

    /// Detach the view, release it, then destroy the window if the host created it.
    pub fn close(self, windows: &mut dyn WindowSystem) {
        let Self { view, window, .. } = self;
        let result = unsafe { view.removed() };
        if result != kResultOk {
            tracing::debug!("View removed() returned {result:#x}");
        }
        drop(view);
        if let EditorWindow::Owned(native) = window {
            windows.destroy_window(native);
        }
    }
}

fn preferred_size(view: &ComPtr<IPlugView>) -> Option<ViewSize> {
    let mut rect = ViewRect {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };
    if unsafe { view.getSize(&mut rect) } != kResultOk {
        return None;
    }
    ViewSize::from_rect(&rect)
}

/// Title of host-owned editor windows.
pub fn window_title(plugin_name: &str) -> String {
    format!("VST3 Plugin - {plugin_name}")
}
