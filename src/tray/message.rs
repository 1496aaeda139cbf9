//! Window message decoding.
//!
//! Turns raw `(message, wParam, lParam)` triples into [`WindowMessage`]
//! values. Decoding is pure so the session's state machine can be driven
//! without a real message pump.

use crate::tray::callbacks::TrayAction;

pub const WM_DESTROY: u32 = 0x0002;
pub const WM_CLOSE: u32 = 0x0010;
pub const WM_ENDSESSION: u32 = 0x0016;
pub const WM_COMMAND: u32 = 0x0111;
pub const WM_MOUSEMOVE: u32 = 0x0200;
pub const WM_LBUTTONDOWN: u32 = 0x0201;
pub const WM_LBUTTONUP: u32 = 0x0202;
pub const WM_RBUTTONUP: u32 = 0x0205;
pub const WM_USER: u32 = 0x0400;

/// Balloon notification timed out or was closed.
pub const NIN_BALLOONTIMEOUT: u32 = WM_USER + 4;
/// Balloon notification was clicked.
pub const NIN_BALLOONUSERCLICK: u32 = WM_USER + 5;

/// Callback message id the notification icon reports interactions with.
pub const WM_TRAY_CALLBACK: u32 = WM_USER + 1;

/// Menu item identifiers.
pub const QUIT_MENU_ID: u16 = 1;
pub const UPDATE_MENU_ID: u16 = 2;
pub const LOGS_MENU_ID: u16 = 3;
pub const GET_STARTED_MENU_ID: u16 = 4;

/// Map a menu item id to the action it raises.
pub fn menu_action(id: u16) -> Option<TrayAction> {
    match id {
        QUIT_MENU_ID => Some(TrayAction::Quit),
        UPDATE_MENU_ID => Some(TrayAction::Update),
        LOGS_MENU_ID => Some(TrayAction::ShowLogs),
        GET_STARTED_MENU_ID => Some(TrayAction::DoFirstUse),
        _ => None,
    }
}

/// A message as delivered to the window procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMessage {
    pub message: u32,
    pub wparam: usize,
    pub lparam: isize,
}

impl RawMessage {
    pub fn new(message: u32, wparam: usize, lparam: isize) -> Self {
        Self {
            message,
            wparam,
            lparam,
        }
    }
}

/// Message ids that are only known at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageIds {
    /// Notification icon callback message.
    pub tray_callback: u32,
    /// Registered `TaskbarCreated` message, broadcast when the shell restarts.
    pub taskbar_created: u32,
}

impl Default for MessageIds {
    fn default() -> Self {
        Self {
            tray_callback: WM_TRAY_CALLBACK,
            // Registered messages live in 0xC000..=0xFFFF; real value comes
            // from RegisterWindowMessageW.
            taskbar_created: 0xC0FE,
        }
    }
}

/// Interaction with the notification icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconEvent {
    /// Pointer movement or button-down; ignored.
    Hover,
    /// Left or right button released; show the context menu.
    OpenMenu,
    /// The balloon notification was clicked.
    NotificationClicked,
    /// The balloon notification timed out or was dismissed.
    NotificationDismissed,
    /// Any other sub-code.
    Other(u32),
}

/// A decoded window message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMessage {
    /// `WM_COMMAND` from a menu, carrying the item id.
    MenuCommand(u16),
    Close,
    Destroy,
    EndSession,
    Icon(IconEvent),
    TaskbarCreated,
    /// Anything else; forwarded to the default window procedure.
    Unhandled,
}

/// Decode a raw message.
pub fn decode(raw: RawMessage, ids: &MessageIds) -> WindowMessage {
    match raw.message {
        WM_COMMAND => WindowMessage::MenuCommand((raw.wparam & 0xFFFF) as u16),
        WM_CLOSE => WindowMessage::Close,
        WM_DESTROY => WindowMessage::Destroy,
        WM_ENDSESSION => WindowMessage::EndSession,
        m if m == ids.tray_callback => WindowMessage::Icon(decode_icon_event(raw.lparam)),
        m if m == ids.taskbar_created => WindowMessage::TaskbarCreated,
        _ => WindowMessage::Unhandled,
    }
}

fn decode_icon_event(lparam: isize) -> IconEvent {
    // Legacy notify-icon versions report the event in the low word.
    let code = (lparam as usize & 0xFFFF) as u32;
    match code {
        WM_MOUSEMOVE | WM_LBUTTONDOWN => IconEvent::Hover,
        WM_RBUTTONUP | WM_LBUTTONUP => IconEvent::OpenMenu,
        NIN_BALLOONUSERCLICK => IconEvent::NotificationClicked,
        NIN_BALLOONTIMEOUT => IconEvent::NotificationDismissed,
        other => IconEvent::Other(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> MessageIds {
        MessageIds {
            tray_callback: WM_TRAY_CALLBACK,
            taskbar_created: 0xC123,
        }
    }

    #[test]
    fn menu_command_uses_low_word_of_wparam() {
        let raw = RawMessage::new(WM_COMMAND, 0x0001_0003, 0);
        assert_eq!(decode(raw, &ids()), WindowMessage::MenuCommand(LOGS_MENU_ID));
    }

    #[test]
    fn lifecycle_messages_decode() {
        assert_eq!(decode(RawMessage::new(WM_CLOSE, 0, 0), &ids()), WindowMessage::Close);
        assert_eq!(decode(RawMessage::new(WM_DESTROY, 0, 0), &ids()), WindowMessage::Destroy);
        assert_eq!(
            decode(RawMessage::new(WM_ENDSESSION, 1, 0), &ids()),
            WindowMessage::EndSession
        );
    }

    #[test]
    fn icon_sub_codes_decode() {
        let icon = |code: u32| decode(RawMessage::new(WM_TRAY_CALLBACK, 0, code as isize), &ids());
        assert_eq!(icon(WM_MOUSEMOVE), WindowMessage::Icon(IconEvent::Hover));
        assert_eq!(icon(WM_LBUTTONDOWN), WindowMessage::Icon(IconEvent::Hover));
        assert_eq!(icon(WM_LBUTTONUP), WindowMessage::Icon(IconEvent::OpenMenu));
        assert_eq!(icon(WM_RBUTTONUP), WindowMessage::Icon(IconEvent::OpenMenu));
        assert_eq!(
            icon(NIN_BALLOONUSERCLICK),
            WindowMessage::Icon(IconEvent::NotificationClicked)
        );
        assert_eq!(
            icon(NIN_BALLOONTIMEOUT),
            WindowMessage::Icon(IconEvent::NotificationDismissed)
        );
        assert_eq!(icon(0x0203), WindowMessage::Icon(IconEvent::Other(0x0203)));
    }

    #[test]
    fn taskbar_created_uses_registered_id() {
        assert_eq!(
            decode(RawMessage::new(0xC123, 0, 0), &ids()),
            WindowMessage::TaskbarCreated
        );
        assert_eq!(decode(RawMessage::new(0xC124, 0, 0), &ids()), WindowMessage::Unhandled);
    }

    #[test]
    fn unknown_messages_are_unhandled() {
        assert_eq!(decode(RawMessage::new(0x000F, 0, 0), &ids()), WindowMessage::Unhandled);
    }

    #[test]
    fn menu_ids_map_to_actions() {
        assert_eq!(menu_action(QUIT_MENU_ID), Some(TrayAction::Quit));
        assert_eq!(menu_action(UPDATE_MENU_ID), Some(TrayAction::Update));
        assert_eq!(menu_action(LOGS_MENU_ID), Some(TrayAction::ShowLogs));
        assert_eq!(menu_action(GET_STARTED_MENU_ID), Some(TrayAction::DoFirstUse));
        assert_eq!(menu_action(99), None);
    }
}
