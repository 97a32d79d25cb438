//! Windows Raw Input notification source.
//!
//! A dedicated thread creates a message-only window, registers it for mouse
//! Raw Input (usage page 0x01, usage 0x02) with device-change notifications,
//! and runs a `GetMessageW` loop. The window procedure decodes each message
//! and forwards a [`Notification`] through a global sender.
//!
//! Stopping posts `WM_QUIT` to the loop thread. The thread then removes the
//! registration, destroys the window and unregisters the class on its own;
//! the next `start()` joins it before creating a new window.
//!
//! # Safety
//!
//! This module uses `unsafe` code exclusively for Windows API FFI calls.
//! All `unsafe` blocks are annotated with `// SAFETY:` comments.

#![cfg(target_os = "windows")]

use std::ffi::c_void;
use std::mem::size_of;
use std::sync::mpsc::{self, Sender};
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use rawmouse_core::{ButtonFlags, DeviceId, DeviceInfo};
use tracing::{debug, info, trace, warn};
use windows::core::PCWSTR;
use windows::Win32::Foundation::{GetLastError, HANDLE, HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::{
    GetRawInputData, GetRawInputDeviceInfoW, RegisterRawInputDevices, HRAWINPUT, RAWINPUT,
    RAWINPUTDEVICE, RAWINPUTHEADER, RAWMOUSE, RIDEV_DEVNOTIFY, RIDEV_INPUTSINK, RIDEV_REMOVE,
    RIDI_DEVICEINFO, RIDI_DEVICENAME, RID_DEVICE_INFO, RID_INPUT, RIM_TYPEMOUSE,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW, PeekMessageW,
    PostThreadMessageW, RegisterClassW, UnregisterClassW, HWND_MESSAGE, MSG, PM_NOREMOVE,
    WINDOW_EX_STYLE, WINDOW_STYLE, WM_INPUT, WM_QUIT, WNDCLASSW,
};

use super::{CaptureError, Notification, NotificationSource, RawMouseSample, SourceError};
use crate::infrastructure::storage::config::CaptureConfig;

const WM_INPUT_DEVICE_CHANGE: u32 = 0x00FE;
const GIDC_ARRIVAL: usize = 1;
const GIDC_REMOVAL: usize = 2;

/// `RegisterClassW` failure meaning the class is still registered by a
/// previous session. Harmless.
const ERROR_CLASS_ALREADY_EXISTS: u32 = 1410;

const HID_USAGE_PAGE_GENERIC: u16 = 0x01;
const HID_USAGE_MOUSE: u16 = 0x02;

/// Sender used by the window procedure. Set by `start()`, cleared by `stop()`.
/// Clearing it closes the capture thread's channel.
static EVENT_SENDER: Mutex<Option<Sender<Notification>>> = Mutex::new(None);

/// Windows Raw Input mouse source.
pub struct WindowsRawInputSource {
    config: CaptureConfig,
    loop_thread: Mutex<Option<LoopThread>>,
}

struct LoopThread {
    thread_id: u32,
    handle: JoinHandle<()>,
    stopped: bool,
}

impl WindowsRawInputSource {
    /// Creates a new (unstarted) source.
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            loop_thread: Mutex::new(None),
        }
    }
}

impl NotificationSource for WindowsRawInputSource {
    fn start(&self) -> Result<mpsc::Receiver<Notification>, CaptureError> {
        let mut slot = self.loop_thread.lock().expect("lock poisoned");

        if let Some(previous) = slot.take() {
            if !previous.stopped {
                *slot = Some(previous);
                return Err(CaptureError::AlreadyRunning);
            }
            // WM_QUIT was posted by stop(); wait for the old window to go away
            // so its class teardown cannot race the new registration.
            if previous.handle.join().is_err() {
                warn!("previous raw input loop thread panicked");
            }
        }

        let (tx, rx) = mpsc::channel::<Notification>();
        *EVENT_SENDER.lock().expect("lock poisoned") = Some(tx);

        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<u32, CaptureError>>(1);
        let config = self.config.clone();
        let handle = thread::Builder::new()
            .name("rawmouse-msg-loop".to_string())
            .spawn(move || run_message_loop(config, ready_tx))
            .map_err(|e| {
                EVENT_SENDER.lock().expect("lock poisoned").take();
                CaptureError::ThreadSpawn(e.to_string())
            })?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(CaptureError::WindowSetup("loop thread exited early".into())));

        match ready {
            Ok(thread_id) => {
                info!(thread_id, class = %self.config.window_class, "raw input registered");
                *slot = Some(LoopThread {
                    thread_id,
                    handle,
                    stopped: false,
                });
                Ok(rx)
            }
            Err(e) => {
                EVENT_SENDER.lock().expect("lock poisoned").take();
                let _ = handle.join();
                Err(e)
            }
        }
    }

    fn stop(&self) -> u32 {
        let mut slot = self.loop_thread.lock().expect("lock poisoned");
        let status = match slot.as_mut() {
            Some(lt) if !lt.stopped => {
                lt.stopped = true;
                // SAFETY: posting to a thread id is safe even if the thread
                // has already exited; the call just fails.
                match unsafe { PostThreadMessageW(lt.thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) } {
                    Ok(()) => 0,
                    // SAFETY: reads the calling thread's last-error value.
                    Err(_) => unsafe { GetLastError().0 },
                }
            }
            _ => 0,
        };
        EVENT_SENDER.lock().expect("lock poisoned").take();
        status
    }

    fn device_info(&self, device: DeviceId) -> Result<DeviceInfo, SourceError> {
        query_device_info(device)
    }
}

// ── Message loop thread ───────────────────────────────────────────────────────

fn run_message_loop(config: CaptureConfig, ready: mpsc::SyncSender<Result<u32, CaptureError>>) {
    let class_name = to_wstring(&config.window_class);

    let window = match create_capture_window(&class_name, config.background) {
        Ok(w) => w,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut msg = MSG::default();
    // SAFETY: forces creation of this thread's message queue so that
    // PostThreadMessageW from stop() cannot be lost.
    unsafe {
        let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
    }
    // SAFETY: no preconditions.
    let thread_id = unsafe { GetCurrentThreadId() };
    let _ = ready.send(Ok(thread_id));

    // SAFETY: Standard Win32 GetMessage/DispatchMessage loop pattern.
    // GetMessageW returns 0 on WM_QUIT and -1 on error.
    unsafe {
        while GetMessageW(&mut msg, None, 0, 0).0 > 0 {
            DispatchMessageW(&msg);
        }
    }

    teardown(window, &class_name);
    debug!("raw input loop thread exiting");
}

struct CaptureWindow {
    hwnd: HWND,
    instance: HINSTANCE,
}

fn create_capture_window(class_name: &[u16], background: bool) -> Result<CaptureWindow, CaptureError> {
    // SAFETY: all pointers passed below outlive the calls; class_name is a
    // null-terminated UTF-16 buffer owned by the caller.
    unsafe {
        let module =
            GetModuleHandleW(None).map_err(|e| CaptureError::WindowSetup(e.to_string()))?;
        let instance = HINSTANCE(module.0);

        let wc = WNDCLASSW {
            lpfnWndProc: Some(window_proc),
            hInstance: instance,
            lpszClassName: PCWSTR(class_name.as_ptr()),
            ..Default::default()
        };
        if RegisterClassW(&wc) == 0 {
            let code = GetLastError().0;
            if code != ERROR_CLASS_ALREADY_EXISTS {
                return Err(CaptureError::WindowSetup(format!(
                    "RegisterClassW failed (os error {code})"
                )));
            }
        }

        let hwnd = CreateWindowExW(
            WINDOW_EX_STYLE(0),
            PCWSTR(class_name.as_ptr()),
            PCWSTR(class_name.as_ptr()),
            WINDOW_STYLE(0),
            0,
            0,
            0,
            0,
            Some(HWND_MESSAGE),
            None,
            Some(instance),
            None,
        )
        .map_err(|e| CaptureError::WindowSetup(e.to_string()))?;

        let flags = if background {
            RIDEV_INPUTSINK | RIDEV_DEVNOTIFY
        } else {
            RIDEV_DEVNOTIFY
        };
        let devices = [RAWINPUTDEVICE {
            usUsagePage: HID_USAGE_PAGE_GENERIC,
            usUsage: HID_USAGE_MOUSE,
            dwFlags: flags,
            hwndTarget: hwnd,
        }];
        if let Err(e) = RegisterRawInputDevices(&devices, size_of::<RAWINPUTDEVICE>() as u32) {
            let _ = DestroyWindow(hwnd);
            let _ = UnregisterClassW(PCWSTR(class_name.as_ptr()), Some(instance));
            return Err(CaptureError::Registration(e.to_string()));
        }

        Ok(CaptureWindow { hwnd, instance })
    }
}

fn teardown(window: CaptureWindow, class_name: &[u16]) {
    let devices = [RAWINPUTDEVICE {
        usUsagePage: HID_USAGE_PAGE_GENERIC,
        usUsage: HID_USAGE_MOUSE,
        dwFlags: RIDEV_REMOVE,
        hwndTarget: HWND::default(),
    }];
    // SAFETY: the window was created on this thread and is destroyed once.
    unsafe {
        if let Err(e) = RegisterRawInputDevices(&devices, size_of::<RAWINPUTDEVICE>() as u32) {
            debug!("raw input removal failed: {e}");
        }
        let _ = DestroyWindow(window.hwnd);
        if let Err(e) = UnregisterClassW(PCWSTR(class_name.as_ptr()), Some(window.instance)) {
            debug!("UnregisterClassW failed: {e}");
        }
    }
}

/// Window procedure for the message-only capture window.
///
/// # Safety
///
/// Called by Windows on the loop thread only.
unsafe extern "system" fn window_proc(
    hwnd: HWND,
    msg: u32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    match msg {
        WM_INPUT => {
            if let Some(sample) = read_mouse_sample(l_param) {
                trace!(?sample, "raw mouse sample");
                send(Notification::Sample(sample));
            }
        }
        WM_INPUT_DEVICE_CHANGE => {
            let device = handle_to_device(l_param.0);
            match w_param.0 {
                GIDC_ARRIVAL => send(Notification::DeviceArrived(device)),
                GIDC_REMOVAL => send(Notification::DeviceRemoved(device)),
                other => trace!(other, "unknown device change code"),
            }
        }
        _ => {}
    }
    // SAFETY: WM_INPUT must reach DefWindowProcW so the OS can free the
    // raw input buffer.
    unsafe { DefWindowProcW(hwnd, msg, w_param, l_param) }
}

fn send(notification: Notification) {
    if let Some(sender) = EVENT_SENDER.lock().expect("lock poisoned").as_ref() {
        // Ignore send errors (receiver gone during shutdown).
        let _ = sender.send(notification);
    }
}

/// Reads the `WM_INPUT` payload and decodes it as a mouse sample.
///
/// Returns `None` for non-mouse input, an empty payload, or when the OS
/// refuses the read.
fn read_mouse_sample(l_param: LPARAM) -> Option<RawMouseSample> {
    let header_size = size_of::<RAWINPUTHEADER>() as u32;
    let mut size = 0u32;

    // SAFETY: the HRAWINPUT handle is valid while WM_INPUT is dispatched and
    // the buffer is exactly `size` bytes.
    let buffer = unsafe {
        let handle = HRAWINPUT(l_param.0 as *mut c_void);
        if GetRawInputData(handle, RID_INPUT, None, &mut size, header_size) != 0 {
            debug!("GetRawInputData size query failed");
            return None;
        }
        if size == 0 {
            trace!("empty raw input payload");
            return None;
        }

        let mut buffer = vec![0u8; size as usize];
        let read = GetRawInputData(
            handle,
            RID_INPUT,
            Some(buffer.as_mut_ptr() as *mut c_void),
            &mut size,
            header_size,
        );
        if read == u32::MAX || read != size {
            debug!(read, size, "GetRawInputData read failed");
            return None;
        }
        buffer
    };

    decode_mouse_payload(&buffer)
}

/// Copies the mouse fields out of a raw input payload.
///
/// Payloads too short to hold a header plus mouse data are rejected.
fn decode_mouse_payload(payload: &[u8]) -> Option<RawMouseSample> {
    if payload.len() < size_of::<RAWINPUTHEADER>() + size_of::<RAWMOUSE>() {
        return None;
    }

    // SAFETY: RAWINPUT is plain old data, so all-zero is a valid value, and
    // at most size_of::<RAWINPUT>() bytes are copied into it.
    let raw: RAWINPUT = unsafe {
        let mut raw: RAWINPUT = std::mem::zeroed();
        std::ptr::copy_nonoverlapping(
            payload.as_ptr(),
            &mut raw as *mut RAWINPUT as *mut u8,
            payload.len().min(size_of::<RAWINPUT>()),
        );
        raw
    };
    if raw.header.dwType != RIM_TYPEMOUSE.0 {
        return None;
    }

    // SAFETY: dwType says the union holds mouse data.
    let mouse = unsafe { raw.data.mouse };
    // SAFETY: both variants of the button union are plain u16 pairs.
    let (button_flags, button_data) = unsafe {
        (
            mouse.Anonymous.Anonymous.usButtonFlags,
            mouse.Anonymous.Anonymous.usButtonData,
        )
    };
    let flags = ButtonFlags(button_flags);
    let wheel = if flags.has_wheel() {
        button_data as i16 as i32
    } else {
        0
    };

    Some(RawMouseSample {
        device: handle_to_device(raw.header.hDevice.0 as isize),
        dx: mouse.lLastX,
        dy: mouse.lLastY,
        wheel,
        button_flags: flags,
    })
}

// ── Device metadata ───────────────────────────────────────────────────────────

fn query_device_info(device: DeviceId) -> Result<DeviceInfo, SourceError> {
    let handle = device_to_handle(device);

    // SAFETY: buffers are sized from the OS-reported length and outlive the calls.
    unsafe {
        let mut name_len = 0u32;
        if GetRawInputDeviceInfoW(Some(handle), RIDI_DEVICENAME, None, &mut name_len) != 0 {
            return Err(SourceError::DeviceQuery {
                device,
                code: GetLastError().0,
            });
        }

        let mut name = String::new();
        if name_len > 0 {
            let mut name_buf = vec![0u16; name_len as usize];
            let copied = GetRawInputDeviceInfoW(
                Some(handle),
                RIDI_DEVICENAME,
                Some(name_buf.as_mut_ptr() as *mut c_void),
                &mut name_len,
            );
            if copied != u32::MAX {
                name = String::from_utf16_lossy(&name_buf)
                    .trim_end_matches('\0')
                    .to_string();
            }
        }

        let mut info = RID_DEVICE_INFO {
            cbSize: size_of::<RID_DEVICE_INFO>() as u32,
            ..Default::default()
        };
        let mut info_len = info.cbSize;
        let copied = GetRawInputDeviceInfoW(
            Some(handle),
            RIDI_DEVICEINFO,
            Some(&mut info as *mut RID_DEVICE_INFO as *mut c_void),
            &mut info_len,
        );
        if copied == u32::MAX || info.dwType != RIM_TYPEMOUSE {
            return Err(SourceError::DeviceQuery {
                device,
                code: GetLastError().0,
            });
        }

        let mouse = info.Anonymous.mouse;
        Ok(DeviceInfo {
            name,
            button_count: mouse.dwNumberOfButtons,
            sample_rate: mouse.dwSampleRate,
            has_horizontal_wheel: mouse.fHasHorizontalWheel.as_bool(),
        })
    }
}

/// Raw Input handles are 32-bit values widened to pointer size.
fn handle_to_device(raw: isize) -> DeviceId {
    DeviceId(raw as i32)
}

fn device_to_handle(device: DeviceId) -> HANDLE {
    HANDLE(device.0 as isize as *mut c_void)
}

fn to_wstring(s: &str) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    std::ffi::OsStr::new(s)
        .encode_wide()
        .chain(std::iter::once(0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_handle_conversion_preserves_low_bits() {
        let device = DeviceId(0x0001_0041);
        assert_eq!(handle_to_device(device_to_handle(device).0 as isize), device);
    }

    #[test]
    fn test_to_wstring_is_null_terminated() {
        let wide = to_wstring("RAWMOUSE_CAPTURE");
        assert_eq!(wide.last(), Some(&0));
        assert_eq!(wide.len(), "RAWMOUSE_CAPTURE".len() + 1);
    }

    #[test]
    fn test_stop_before_start_is_a_no_op() {
        let source = WindowsRawInputSource::new(CaptureConfig::default());
        assert_eq!(source.stop(), 0);
    }

    fn mouse_payload(device: isize, dx: i32, flags: u16) -> Vec<u8> {
        // SAFETY: zeroed RAWINPUT is valid; the byte view covers exactly it.
        unsafe {
            let mut raw: RAWINPUT = std::mem::zeroed();
            raw.header.dwType = RIM_TYPEMOUSE.0;
            raw.header.dwSize = size_of::<RAWINPUT>() as u32;
            raw.header.hDevice = HANDLE(device as *mut c_void);
            raw.data.mouse.lLastX = dx;
            raw.data.mouse.Anonymous.Anonymous.usButtonFlags = flags;
            std::slice::from_raw_parts(
                &raw as *const RAWINPUT as *const u8,
                size_of::<RAWINPUT>(),
            )
            .to_vec()
        }
    }

    #[test]
    fn test_empty_payload_yields_no_sample() {
        assert_eq!(decode_mouse_payload(&[]), None);
    }

    #[test]
    fn test_header_only_payload_yields_no_sample() {
        let payload = mouse_payload(0x41, 3, 0);
        assert_eq!(decode_mouse_payload(&payload[..size_of::<RAWINPUTHEADER>()]), None);
    }

    #[test]
    fn test_mouse_payload_decodes_device_and_motion() {
        // Arrange
        let payload = mouse_payload(0x41, -7, ButtonFlags::LEFT_DOWN);

        // Act
        let sample = decode_mouse_payload(&payload).expect("mouse payload");

        // Assert
        assert_eq!(sample.device, DeviceId(0x41));
        assert_eq!(sample.dx, -7);
        assert_eq!(sample.button_flags, ButtonFlags(ButtonFlags::LEFT_DOWN));
        assert_eq!(sample.wheel, 0);
    }
}
