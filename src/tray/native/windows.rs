//! Win32 tray backend.
//!
//! A hidden window owns the notification icon. Its window procedure forwards
//! every message to the [`TraySession`] stored in a thread-local, which is
//! sound because the window, and therefore every call to the procedure,
//! lives on the pump thread.

use super::{TrayHandle, TrayOptions, spawn_session_thread};
use crate::error::{LanternError, Result};
use crate::tray::callbacks::TrayCallbacks;
use crate::tray::message::{
    GET_STARTED_MENU_ID, LOGS_MENU_ID, MessageIds, QUIT_MENU_ID, RawMessage, UPDATE_MENU_ID,
    WM_CLOSE, WM_TRAY_CALLBACK,
};
use crate::tray::pump::{MessageSource, PumpStep};
use crate::tray::session::{Dispatch, IconDescriptor, TrayPlatform, TraySession};
use std::cell::RefCell;
use std::sync::Arc;
use windows_sys::Win32::Foundation::{HWND, LPARAM, LRESULT, POINT, WPARAM};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::UI::Shell::{
    NIF_ICON, NIF_INFO, NIF_MESSAGE, NIF_TIP, NIIF_INFO, NIM_ADD, NIM_DELETE, NIM_MODIFY,
    NOTIFY_ICON_MESSAGE, NOTIFYICONDATAW, Shell_NotifyIconW,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CW_USEDEFAULT, CreatePopupMenu, CreateWindowExW, DefWindowProcW, DestroyMenu,
    DestroyWindow, DispatchMessageW, GetCursorPos, GetMessageW, HICON, IDI_APPLICATION, LoadIconW,
    MF_SEPARATOR, MF_STRING, MSG, PostMessageW, PostQuitMessage, RegisterClassExW,
    RegisterWindowMessageW, SetForegroundWindow, TPM_BOTTOMALIGN, TPM_LEFTALIGN, TPM_RIGHTBUTTON,
    TrackPopupMenu, TranslateMessage, UnregisterClassW, WNDCLASSEXW, WS_OVERLAPPEDWINDOW,
};

const CLASS_NAME: &str = "LanternTrayWindow";
const WINDOW_TITLE: &str = "Lantern";
const TRAY_ICON_ID: u32 = 100;

thread_local! {
    static SESSION: RefCell<Option<Arc<TraySession<Win32Tray>>>> = const { RefCell::new(None) };
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

/// Copy `s` into a fixed, NUL-terminated UTF-16 buffer, truncating if needed.
fn copy_wide(dst: &mut [u16], s: &str) {
    let Some(max) = dst.len().checked_sub(1) else {
        return;
    };
    let mut len = 0;
    for (slot, unit) in dst.iter_mut().zip(s.encode_utf16().take(max)) {
        *slot = unit;
        len += 1;
    }
    dst[len] = 0;
}

fn last_error(call: &str) -> LanternError {
    LanternError::Tray(format!("{call} failed: {}", std::io::Error::last_os_error()))
}

/// Window, class and icon handles. Handles are kept as integers so the
/// platform can be shared with other threads; only the pump thread touches
/// the window itself.
struct Win32Tray {
    hwnd: isize,
    hinstance: isize,
    icon: isize,
    class_name: Vec<u16>,
}

impl Win32Tray {
    fn create() -> Result<Self> {
        let class_name = wide(CLASS_NAME);
        let title = wide(WINDOW_TITLE);

        // SAFETY: plain Win32 calls with valid, NUL-terminated strings that
        // outlive each call.
        unsafe {
            let hinstance = GetModuleHandleW(std::ptr::null());
            if hinstance.is_null() {
                return Err(last_error("GetModuleHandleW"));
            }
            let icon = LoadIconW(std::ptr::null_mut(), IDI_APPLICATION);

            let mut class: WNDCLASSEXW = std::mem::zeroed();
            class.cbSize = std::mem::size_of::<WNDCLASSEXW>() as u32;
            class.lpfnWndProc = Some(window_proc);
            class.hInstance = hinstance;
            class.hIcon = icon;
            class.lpszClassName = class_name.as_ptr();
            if RegisterClassExW(&class) == 0 {
                return Err(last_error("RegisterClassExW"));
            }

            let hwnd = CreateWindowExW(
                0,
                class_name.as_ptr(),
                title.as_ptr(),
                WS_OVERLAPPEDWINDOW,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                hinstance,
                std::ptr::null(),
            );
            if hwnd.is_null() {
                let err = last_error("CreateWindowExW");
                UnregisterClassW(class_name.as_ptr(), hinstance);
                return Err(err);
            }

            Ok(Self {
                hwnd: hwnd as isize,
                hinstance: hinstance as isize,
                icon: icon as isize,
                class_name,
            })
        }
    }

    fn hwnd(&self) -> HWND {
        self.hwnd as HWND
    }

    fn notify_data(&self, icon: &IconDescriptor) -> NOTIFYICONDATAW {
        // SAFETY: NOTIFYICONDATAW is plain data; all-zero is a valid value.
        let mut nid: NOTIFYICONDATAW = unsafe { std::mem::zeroed() };
        nid.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        nid.hWnd = self.hwnd();
        nid.uID = TRAY_ICON_ID;
        nid.uFlags = NIF_MESSAGE | NIF_ICON | NIF_TIP;
        nid.uCallbackMessage = WM_TRAY_CALLBACK;
        nid.hIcon = self.icon as HICON;
        copy_wide(&mut nid.szTip, &icon.tooltip);
        if let Some(balloon) = &icon.balloon {
            nid.uFlags |= NIF_INFO;
            nid.dwInfoFlags = NIIF_INFO;
            copy_wide(&mut nid.szInfoTitle, &balloon.title);
            copy_wide(&mut nid.szInfo, &balloon.text);
        }
        nid
    }

    fn shell_notify(&self, op: NOTIFY_ICON_MESSAGE, nid: &NOTIFYICONDATAW) -> Result<()> {
        // SAFETY: `nid` is fully initialised and sized via cbSize.
        if unsafe { Shell_NotifyIconW(op, nid) } == 0 {
            return Err(last_error("Shell_NotifyIconW"));
        }
        Ok(())
    }
}

impl TrayPlatform for Win32Tray {
    fn destroy_window(&self) -> Result<()> {
        // SAFETY: called on the pump thread that created the window.
        if unsafe { DestroyWindow(self.hwnd()) } == 0 {
            return Err(last_error("DestroyWindow"));
        }
        Ok(())
    }

    fn unregister_class(&self) -> Result<()> {
        // SAFETY: class name buffer is NUL-terminated and owned by self.
        if unsafe { UnregisterClassW(self.class_name.as_ptr(), self.hinstance as _) } == 0 {
            return Err(last_error("UnregisterClassW"));
        }
        Ok(())
    }

    fn add_icon(&self, icon: &mut IconDescriptor) -> Result<()> {
        self.shell_notify(NIM_ADD, &self.notify_data(icon))?;
        icon.registered = true;
        icon.balloon = None;
        Ok(())
    }

    fn modify_icon(&self, icon: &mut IconDescriptor) -> Result<()> {
        self.shell_notify(NIM_MODIFY, &self.notify_data(icon))?;
        icon.balloon = None;
        Ok(())
    }

    fn delete_icon(&self, icon: &mut IconDescriptor) -> Result<()> {
        // SAFETY: plain data, zero is valid.
        let mut nid: NOTIFYICONDATAW = unsafe { std::mem::zeroed() };
        nid.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        nid.hWnd = self.hwnd();
        nid.uID = TRAY_ICON_ID;
        self.shell_notify(NIM_DELETE, &nid)?;
        icon.registered = false;
        Ok(())
    }

    fn show_menu(&self, update_pending: bool) -> Result<()> {
        let mut items: Vec<(u16, &str)> = Vec::with_capacity(5);
        if update_pending {
            items.push((UPDATE_MENU_ID, "Restart to update"));
            items.push((0, ""));
        }
        items.push((GET_STARTED_MENU_ID, "Get started"));
        items.push((LOGS_MENU_ID, "View logs"));
        items.push((0, ""));
        items.push((QUIT_MENU_ID, "Quit Lantern"));

        // SAFETY: the menu is created, shown and destroyed on the pump thread;
        // label buffers outlive AppendMenuW.
        unsafe {
            let menu = CreatePopupMenu();
            if menu.is_null() {
                return Err(last_error("CreatePopupMenu"));
            }
            for (id, label) in items {
                let ok = if id == 0 {
                    AppendMenuW(menu, MF_SEPARATOR, 0, std::ptr::null())
                } else {
                    let label = wide(label);
                    AppendMenuW(menu, MF_STRING, usize::from(id), label.as_ptr())
                };
                if ok == 0 {
                    let err = last_error("AppendMenuW");
                    DestroyMenu(menu);
                    return Err(err);
                }
            }

            let mut point = POINT { x: 0, y: 0 };
            GetCursorPos(&mut point);
            // Required so the menu closes when the user clicks elsewhere.
            SetForegroundWindow(self.hwnd());
            let shown = TrackPopupMenu(
                menu,
                TPM_BOTTOMALIGN | TPM_LEFTALIGN | TPM_RIGHTBUTTON,
                point.x,
                point.y,
                0,
                self.hwnd(),
                std::ptr::null(),
            );
            DestroyMenu(menu);
            if shown == 0 {
                return Err(last_error("TrackPopupMenu"));
            }
        }
        Ok(())
    }

    fn post_quit(&self) {
        // SAFETY: posts WM_QUIT to the calling (pump) thread's queue.
        unsafe { PostQuitMessage(0) };
    }

    fn post_close(&self) -> Result<()> {
        // SAFETY: PostMessageW is safe to call from any thread.
        if unsafe { PostMessageW(self.hwnd(), WM_CLOSE, 0, 0) } == 0 {
            return Err(last_error("PostMessageW"));
        }
        Ok(())
    }
}

unsafe extern "system" fn window_proc(
    hwnd: HWND,
    message: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    // Clone out of the cell so re-entrant messages (DestroyWindow sends
    // WM_DESTROY synchronously) never hit an active borrow.
    let session = SESSION.with(|cell| cell.borrow().clone());
    if let Some(session) = session {
        if session.handle(RawMessage::new(message, wparam, lparam)) == Dispatch::Handled {
            return 0;
        }
    }
    // SAFETY: forwarding the exact arguments we were called with.
    unsafe { DefWindowProcW(hwnd, message, wparam, lparam) }
}

/// `GetMessageW` / `TranslateMessage` / `DispatchMessageW` loop step.
struct Win32Pump;

impl MessageSource for Win32Pump {
    fn pump_one(&mut self) -> PumpStep {
        // SAFETY: MSG is plain data and only used on this thread.
        unsafe {
            let mut msg: MSG = std::mem::zeroed();
            match GetMessageW(&mut msg, std::ptr::null_mut(), 0, 0) {
                -1 => PumpStep::Failed(std::io::Error::last_os_error().to_string()),
                0 => PumpStep::Quit,
                _ => {
                    TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                    PumpStep::Continue
                }
            }
        }
    }
}

fn taskbar_created_message() -> Result<u32> {
    let name = wide("TaskbarCreated");
    // SAFETY: NUL-terminated string valid for the call.
    let id = unsafe { RegisterWindowMessageW(name.as_ptr()) };
    if id == 0 {
        return Err(last_error("RegisterWindowMessageW"));
    }
    Ok(id)
}

pub(super) fn spawn(callbacks: TrayCallbacks, options: TrayOptions) -> Result<TrayHandle> {
    spawn_session_thread("lantern-tray-pump", move || {
        let ids = MessageIds {
            tray_callback: WM_TRAY_CALLBACK,
            taskbar_created: taskbar_created_message()?,
        };
        let platform = Win32Tray::create()?;
        let session = Arc::new(TraySession::new(
            platform,
            callbacks,
            ids,
            IconDescriptor::new(options.tooltip),
        ));
        SESSION.with(|cell| *cell.borrow_mut() = Some(Arc::clone(&session)));

        if let Err(e) = session.show_icon() {
            SESSION.with(|cell| cell.borrow_mut().take());
            let _ = session.platform().destroy_window();
            let _ = session.platform().unregister_class();
            return Err(e);
        }
        Ok((session, Win32Pump))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_wide_truncates_and_terminates() {
        let mut buf = [0xFFFFu16; 4];
        copy_wide(&mut buf, "Lantern");
        assert_eq!(&buf[..3], &wide("Lan")[..3]);
        assert_eq!(buf[3], 0);
    }

    #[test]
    fn wide_is_nul_terminated() {
        assert_eq!(wide("ab"), vec![u16::from(b'a'), u16::from(b'b'), 0]);
    }
}
