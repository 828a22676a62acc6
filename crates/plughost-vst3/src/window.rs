//! Native window handles and host-owned editor windows.
//!
//! Embedding into a caller window only needs a [`WindowHandle`]. When no parent is
//! given the registry asks its [`WindowSystem`] for a top-level window instead.
//! Close requests from those windows arrive as [`WindowEvent`]s on a channel; the
//! owning plugin id travels in the window's user data.

use std::ffi::{c_void, CStr};
use std::fmt;

use crossbeam_channel::Sender;
use raw_window_handle::RawWindowHandle;
use serde::{Deserialize, Serialize};
use vst3::Steinberg::ViewRect;

use crate::error::{HostError, Result};
use crate::metadata::PluginId;

/// Window handle kinds a plugin view can attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformType {
    Hwnd,
    NsView,
    X11EmbedWindowId,
}

impl PlatformType {
    /// Handle kind of the platform this host was built for.
    pub fn native() -> Self {
        if cfg!(windows) {
            PlatformType::Hwnd
        } else if cfg!(target_os = "macos") {
            PlatformType::NsView
        } else {
            PlatformType::X11EmbedWindowId
        }
    }

    pub fn as_cstr(self) -> &'static CStr {
        match self {
            PlatformType::Hwnd => c"HWND",
            PlatformType::NsView => c"NSView",
            PlatformType::X11EmbedWindowId => c"X11EmbedWindowID",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_cstr().to_string_lossy())
    }
}

/// An opaque native window: HWND, NSView pointer or X11 window id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle {
    pub platform: PlatformType,
    pub raw: usize,
}

impl WindowHandle {
    pub fn new(platform: PlatformType, raw: usize) -> Self {
        Self { platform, raw }
    }

    /// A handle of this platform's native kind.
    pub fn native(raw: usize) -> Self {
        Self::new(PlatformType::native(), raw)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.raw as *mut c_void
    }
}

impl TryFrom<RawWindowHandle> for WindowHandle {
    type Error = HostError;

    fn try_from(handle: RawWindowHandle) -> Result<Self> {
        let (platform, raw) = match handle {
            RawWindowHandle::Win32(h) => (PlatformType::Hwnd, h.hwnd.get() as usize),
            RawWindowHandle::AppKit(h) => (PlatformType::NsView, h.ns_view.as_ptr() as usize),
            RawWindowHandle::Xlib(h) => (PlatformType::X11EmbedWindowId, h.window as usize),
            RawWindowHandle::Xcb(h) => (PlatformType::X11EmbedWindowId, h.window.get() as usize),
            other => {
                return Err(HostError::Editor(format!(
                    "unsupported parent window handle: {other:?}"
                )))
            }
        };
        Ok(Self { platform, raw })
    }
}

/// Editor size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewSize {
    pub width: u32,
    pub height: u32,
}

impl ViewSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// `None` for empty or inverted rectangles.
    pub fn from_rect(rect: &ViewRect) -> Option<Self> {
        let width = rect.right.checked_sub(rect.left)?;
        let height = rect.bottom.checked_sub(rect.top)?;
        (width > 0 && height > 0).then(|| Self::new(width as u32, height as u32))
    }
}

impl Default for ViewSize {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// A window created by a [`WindowSystem`]. Destroyed only through that system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeWindow {
    pub handle: WindowHandle,
    /// Client area, matching the editor size.
    pub size: ViewSize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowEvent {
    /// The user tried to close the editor window of this plugin.
    CloseRequested(PluginId),
}

/// Creates and destroys the top-level windows used when no parent is supplied.
pub trait WindowSystem: Send {
    fn create_window(&mut self, owner: &PluginId, title: &str, size: ViewSize) -> Result<NativeWindow>;

    fn destroy_window(&mut self, window: NativeWindow);

    /// Dispatch pending native messages so close requests reach the event channel.
    fn pump(&mut self) {}
}

/// Window system for platforms without a built-in implementation.
/// Editors can still be embedded into caller-supplied windows.
#[derive(Debug, Default)]
pub struct NoWindowSystem;

impl WindowSystem for NoWindowSystem {
    fn create_window(&mut self, _owner: &PluginId, _title: &str, _size: ViewSize) -> Result<NativeWindow> {
        Err(HostError::Editor(
            "no native window system on this platform, pass a parent window".to_string(),
        ))
    }

    fn destroy_window(&mut self, _window: NativeWindow) {}
}

/// The platform's window system, reporting close requests on `events`.
pub fn native_window_system(events: Sender<WindowEvent>) -> Box<dyn WindowSystem> {
    #[cfg(windows)]
    {
        Box::new(win32::Win32WindowSystem::new(events))
    }
    #[cfg(not(windows))]
    {
        drop(events);
        Box::new(NoWindowSystem)
    }
}

#[cfg(windows)]
mod win32 {
    use std::collections::HashMap;
    use std::ffi::c_void;

    use crossbeam_channel::Sender;
    use windows::core::{w, PCWSTR};
    use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, RECT, WPARAM};
    use windows::Win32::Graphics::Gdi::UpdateWindow;
    use windows::Win32::System::LibraryLoader::GetModuleHandleW;
    use windows::Win32::UI::WindowsAndMessaging::{
        AdjustWindowRectEx, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW,
        GetWindowLongPtrW, LoadCursorW, PeekMessageW, RegisterClassW, SetWindowLongPtrW,
        ShowWindow, TranslateMessage, CREATESTRUCTW, CW_USEDEFAULT, GWLP_USERDATA, IDC_ARROW,
        MSG, PM_REMOVE, SW_SHOW, WINDOW_EX_STYLE, WM_CLOSE, WM_NCCREATE, WNDCLASSW,
        WS_OVERLAPPEDWINDOW,
    };

    use super::{NativeWindow, PlatformType, ViewSize, WindowEvent, WindowHandle, WindowSystem};
    use crate::error::{HostError, Result};
    use crate::metadata::PluginId;

    const CLASS_NAME: PCWSTR = w!("VST3PluginWindow");

    /// Stored in `GWLP_USERDATA`; owned by the window system until the window is destroyed.
    struct WindowData {
        owner: PluginId,
        events: Sender<WindowEvent>,
    }

    pub(super) struct Win32WindowSystem {
        events: Sender<WindowEvent>,
        registered: bool,
        windows: HashMap<usize, Box<WindowData>>,
    }

    impl Win32WindowSystem {
        pub(super) fn new(events: Sender<WindowEvent>) -> Self {
            Self {
                events,
                registered: false,
                windows: HashMap::new(),
            }
        }

        fn register_class(&mut self) -> Result<()> {
            if self.registered {
                return Ok(());
            }
            unsafe {
                let instance = GetModuleHandleW(None).map_err(win32_error)?;
                let class = WNDCLASSW {
                    lpfnWndProc: Some(window_proc),
                    hInstance: instance.into(),
                    hCursor: LoadCursorW(None, IDC_ARROW).map_err(win32_error)?,
                    lpszClassName: CLASS_NAME,
                    ..Default::default()
                };
                // Zero also means "already registered" by another host in this process.
                RegisterClassW(&class);
            }
            self.registered = true;
            Ok(())
        }
    }

    impl WindowSystem for Win32WindowSystem {
        fn create_window(&mut self, owner: &PluginId, title: &str, size: ViewSize) -> Result<NativeWindow> {
            self.register_class()?;

            let mut data = Box::new(WindowData {
                owner: owner.clone(),
                events: self.events.clone(),
            });
            let title: Vec<u16> = title.encode_utf16().chain(std::iter::once(0)).collect();
            let mut rect = RECT {
                left: 0,
                top: 0,
                right: size.width as i32,
                bottom: size.height as i32,
            };

            let hwnd = unsafe {
                AdjustWindowRectEx(&mut rect, WS_OVERLAPPEDWINDOW, false, WINDOW_EX_STYLE::default())
                    .map_err(win32_error)?;
                let instance = GetModuleHandleW(None).map_err(win32_error)?;
                CreateWindowExW(
                    WINDOW_EX_STYLE::default(),
                    CLASS_NAME,
                    PCWSTR(title.as_ptr()),
                    WS_OVERLAPPEDWINDOW,
                    CW_USEDEFAULT,
                    CW_USEDEFAULT,
                    rect.right - rect.left,
                    rect.bottom - rect.top,
                    None,
                    None,
                    instance,
                    Some(data.as_mut() as *mut WindowData as *const c_void),
                )
            };
            if hwnd.0 == 0 {
                return Err(win32_error(windows::core::Error::from_win32()));
            }

            unsafe {
                ShowWindow(hwnd, SW_SHOW);
                UpdateWindow(hwnd);
            }
            let raw = hwnd.0 as usize;
            self.windows.insert(raw, data);
            tracing::debug!("Created editor window {raw:#x} for {owner}");
            Ok(NativeWindow {
                handle: WindowHandle::new(PlatformType::Hwnd, raw),
                size,
            })
        }

        fn destroy_window(&mut self, window: NativeWindow) {
            let hwnd = HWND(window.handle.raw as isize);
            unsafe {
                SetWindowLongPtrW(hwnd, GWLP_USERDATA, 0);
                if let Err(e) = DestroyWindow(hwnd) {
                    tracing::warn!("DestroyWindow failed: {e}");
                }
            }
            self.windows.remove(&window.handle.raw);
        }

        fn pump(&mut self) {
            let mut msg = MSG::default();
            unsafe {
                while PeekMessageW(&mut msg, None, 0, 0, PM_REMOVE).as_bool() {
                    TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            }
        }
    }

    unsafe extern "system" fn window_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
        match msg {
            WM_NCCREATE => {
                let create = lparam.0 as *const CREATESTRUCTW;
                if let Some(create) = create.as_ref() {
                    SetWindowLongPtrW(hwnd, GWLP_USERDATA, create.lpCreateParams as isize);
                }
            }
            WM_CLOSE => {
                // The registry hides the editor, which destroys the window.
                let data = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const WindowData;
                if let Some(data) = data.as_ref() {
                    let _ = data
                        .events
                        .send(WindowEvent::CloseRequested(data.owner.clone()));
                }
                return LRESULT(0);
            }
            _ => {}
        }
        DefWindowProcW(hwnd, msg, wparam, lparam)
    }

    fn win32_error(e: windows::core::Error) -> HostError {
        HostError::Editor(format!("Win32 window error: {e}"))
    }
}
