//! Tray session state machine.
//!
//! A session moves through `Created → Running → Closing → Destroyed`. The
//! window procedure hands every message to [`TraySession::handle`], which
//! decodes it and performs side effects through the [`TrayPlatform`]
//! capability. The notification-icon descriptor is shared between the pump
//! thread and callers such as the update scheduler, so it only ever changes
//! under its mutex.

use crate::error::Result;
use crate::tray::callbacks::{TrayAction, TrayCallbacks};
use crate::tray::message::{self, IconEvent, MessageIds, RawMessage, WindowMessage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info};

/// Lifecycle of a tray session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Window class registered, icon and menu built; pump not started.
    Created,
    /// The message pump is running.
    Running,
    /// The window was destroyed and the pump has been asked to unwind.
    Closing,
    /// The pump has exited.
    Destroyed,
}

/// Platform-neutral description of the notification icon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconDescriptor {
    /// Hover tooltip.
    pub tooltip: String,
    /// Balloon notification to show on the next add/modify.
    pub balloon: Option<Balloon>,
    /// Whether the shell currently knows about the icon.
    pub registered: bool,
}

impl IconDescriptor {
    pub fn new(tooltip: impl Into<String>) -> Self {
        Self {
            tooltip: tooltip.into(),
            balloon: None,
            registered: false,
        }
    }
}

/// Balloon notification content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Balloon {
    pub title: String,
    pub text: String,
}

/// Side effects the state machine needs from the windowing system.
pub trait TrayPlatform: Send + Sync {
    fn destroy_window(&self) -> Result<()>;
    fn unregister_class(&self) -> Result<()>;
    /// Register the icon with the shell.
    fn add_icon(&self, icon: &mut IconDescriptor) -> Result<()>;
    /// Push descriptor changes to an already registered icon.
    fn modify_icon(&self, icon: &mut IconDescriptor) -> Result<()>;
    fn delete_icon(&self, icon: &mut IconDescriptor) -> Result<()>;
    /// Show the context menu, including the update item when `update_pending`.
    fn show_menu(&self, update_pending: bool) -> Result<()>;
    /// Ask the pump to unwind (`PostQuitMessage`).
    fn post_quit(&self);
    /// Post a close message to the session window.
    fn post_close(&self) -> Result<()>;
}

/// What the window procedure should do after [`TraySession::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The session consumed the message; return 0.
    Handled,
    /// Forward to the default window procedure unchanged.
    Default,
}

/// A tray icon session bound to one window.
pub struct TraySession<P: TrayPlatform> {
    platform: P,
    callbacks: TrayCallbacks,
    ids: MessageIds,
    icon: Mutex<Option<IconDescriptor>>,
    update_pending: AtomicBool,
    state: Mutex<SessionState>,
    quit_requested: AtomicBool,
}

impl<P: TrayPlatform> TraySession<P> {
    /// Create a session in the `Created` state around an already built window.
    pub fn new(
        platform: P,
        callbacks: TrayCallbacks,
        ids: MessageIds,
        icon: IconDescriptor,
    ) -> Self {
        Self {
            platform,
            callbacks,
            ids,
            icon: Mutex::new(Some(icon)),
            update_pending: AtomicBool::new(false),
            state: Mutex::new(SessionState::Created),
            quit_requested: AtomicBool::new(false),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn message_ids(&self) -> MessageIds {
        self.ids
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    pub(crate) fn set_state(&self, next: SessionState) {
        let mut state = lock(&self.state);
        debug!(from = ?*state, to = ?next, "tray session transition");
        *state = next;
    }

    pub fn is_update_pending(&self) -> bool {
        self.update_pending.load(Ordering::Acquire)
    }

    /// Snapshot of the icon descriptor, `None` once it has been deleted.
    pub fn icon(&self) -> Option<IconDescriptor> {
        self.lock_icon().clone()
    }

    fn lock_icon(&self) -> MutexGuard<'_, Option<IconDescriptor>> {
        lock(&self.icon)
    }

    /// Register the icon with the shell.
    ///
    /// # Errors
    ///
    /// Returns the platform error if the shell rejects the icon.
    pub fn show_icon(&self) -> Result<()> {
        let mut icon = self.lock_icon();
        match icon.as_mut() {
            Some(icon) => self.platform.add_icon(icon),
            None => Ok(()),
        }
    }

    /// Flag a staged update: the menu gains an update item, the icon shows a
    /// balloon, and clicking the balloon raises [`TrayAction::Update`].
    ///
    /// Safe to call from any thread; repeated calls do nothing.
    pub fn mark_update_pending(&self, version: &str) {
        if self.update_pending.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(version, "update pending, notifying tray");

        let mut icon = self.lock_icon();
        if let Some(icon) = icon.as_mut() {
            let label = if version.is_empty() {
                "An update is ready".to_owned()
            } else {
                format!("Version {version} is ready")
            };
            icon.tooltip = format!("{} ({label})", icon.tooltip);
            icon.balloon = Some(Balloon {
                title: "Update available".to_owned(),
                text: format!("{label}. Click to restart and update."),
            });
            if let Err(e) = self.platform.modify_icon(icon) {
                error!("failed to show update notification: {e}");
            }
        }
    }

    /// Request the pump to unwind by posting a close message.
    ///
    /// Only the first call has an effect, even when called concurrently.
    pub fn quit(&self) {
        if self.quit_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.platform.post_close() {
            error!("failed to post close message on shutdown: {e}");
        }
    }

    /// Decode and process a raw window message.
    pub fn handle(&self, raw: RawMessage) -> Dispatch {
        self.dispatch(message::decode(raw, &self.ids))
    }

    /// Process a decoded window message.
    pub fn dispatch(&self, msg: WindowMessage) -> Dispatch {
        match msg {
            WindowMessage::MenuCommand(id) => match message::menu_action(id) {
                Some(action) => {
                    self.callbacks.notify(action);
                }
                None => debug!("unexpected menu item id: {id}"),
            },
            WindowMessage::Close => {
                if let Err(e) = self.platform.destroy_window() {
                    error!("failed to destroy window: {e}");
                }
                if let Err(e) = self.platform.unregister_class() {
                    error!("failed to unregister window class: {e}");
                }
            }
            WindowMessage::Destroy => {
                self.delete_icon();
                self.set_state(SessionState::Closing);
                self.platform.post_quit();
            }
            WindowMessage::EndSession => self.delete_icon(),
            WindowMessage::Icon(event) => self.on_icon_event(event),
            WindowMessage::TaskbarCreated => {
                debug!("taskbar created, re-adding notification icon");
                let mut icon = self.lock_icon();
                if let Some(icon) = icon.as_mut() {
                    icon.registered = false;
                    if let Err(e) = self.platform.add_icon(icon) {
                        error!("failed to refresh the taskbar on shell restart: {e}");
                    }
                }
            }
            WindowMessage::Unhandled => return Dispatch::Default,
        }
        Dispatch::Handled
    }

    fn on_icon_event(&self, event: IconEvent) {
        match event {
            IconEvent::Hover | IconEvent::NotificationDismissed => {}
            IconEvent::OpenMenu => {
                if let Err(e) = self.platform.show_menu(self.is_update_pending()) {
                    error!("failed to show menu: {e}");
                }
            }
            IconEvent::NotificationClicked => {
                let action = if self.is_update_pending() {
                    TrayAction::Update
                } else {
                    TrayAction::DoFirstUse
                };
                self.callbacks.notify(action);
            }
            IconEvent::Other(code) => {
                debug!("unmanaged notification icon event: {code:#x}");
            }
        }
    }

    fn delete_icon(&self) {
        let mut icon = self.lock_icon();
        if let Some(mut descriptor) = icon.take() {
            if let Err(e) = self.platform.delete_icon(&mut descriptor) {
                error!("failed to delete notification icon: {e}");
            }
        }
    }
}

/// Lock, recovering the guard if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
pub(crate) mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::error::LanternError;
    use crate::tray::callbacks::tray_channels;
    use crate::tray::message::{
        GET_STARTED_MENU_ID, LOGS_MENU_ID, NIN_BALLOONTIMEOUT, NIN_BALLOONUSERCLICK, QUIT_MENU_ID,
        UPDATE_MENU_ID, WM_CLOSE, WM_COMMAND, WM_DESTROY, WM_ENDSESSION, WM_LBUTTONUP,
        WM_MOUSEMOVE, WM_RBUTTONUP,
    };
    use std::sync::Arc;

    /// Platform double recording every call.
    #[derive(Default)]
    pub(crate) struct FakePlatform {
        pub calls: Mutex<Vec<String>>,
        pub fail_add: AtomicBool,
    }

    impl FakePlatform {
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        pub fn count(&self, call: &str) -> usize {
            self.calls().iter().filter(|c| c.as_str() == call).count()
        }
    }

    impl TrayPlatform for FakePlatform {
        fn destroy_window(&self) -> Result<()> {
            self.record("destroy_window");
            Ok(())
        }

        fn unregister_class(&self) -> Result<()> {
            self.record("unregister_class");
            Ok(())
        }

        fn add_icon(&self, icon: &mut IconDescriptor) -> Result<()> {
            self.record("add_icon");
            if self.fail_add.load(Ordering::SeqCst) {
                return Err(LanternError::Tray("shell not ready".to_owned()));
            }
            icon.registered = true;
            Ok(())
        }

        fn modify_icon(&self, _icon: &mut IconDescriptor) -> Result<()> {
            self.record("modify_icon");
            Ok(())
        }

        fn delete_icon(&self, icon: &mut IconDescriptor) -> Result<()> {
            self.record("delete_icon");
            icon.registered = false;
            Ok(())
        }

        fn show_menu(&self, update_pending: bool) -> Result<()> {
            self.record(format!("show_menu(update={update_pending})"));
            Ok(())
        }

        fn post_quit(&self) {
            self.record("post_quit");
        }

        fn post_close(&self) -> Result<()> {
            self.record("post_close");
            Ok(())
        }
    }

    fn session() -> (
        TraySession<FakePlatform>,
        crate::tray::callbacks::TrayReceivers,
    ) {
        let (callbacks, receivers) = tray_channels();
        let session = TraySession::new(
            FakePlatform::default(),
            callbacks,
            MessageIds::default(),
            IconDescriptor::new("Lantern"),
        );
        (session, receivers)
    }

    fn command(id: u16) -> RawMessage {
        RawMessage::new(WM_COMMAND, usize::from(id), 0)
    }

    fn icon_event(code: u32) -> RawMessage {
        RawMessage::new(crate::tray::message::WM_TRAY_CALLBACK, 0, code as isize)
    }

    #[test]
    fn new_session_is_created_with_icon() {
        let (session, _rx) = session();
        assert_eq!(session.state(), SessionState::Created);
        assert!(session.icon().is_some());
        assert!(!session.is_update_pending());
    }

    #[test]
    fn menu_commands_route_to_their_channels() {
        let cases = [
            (QUIT_MENU_ID, TrayAction::Quit),
            (UPDATE_MENU_ID, TrayAction::Update),
            (LOGS_MENU_ID, TrayAction::ShowLogs),
            (GET_STARTED_MENU_ID, TrayAction::DoFirstUse),
        ];
        for (id, action) in cases {
            let (session, rx) = session();
            assert_eq!(session.handle(command(id)), Dispatch::Handled);
            assert_eq!(rx.receiver(action).try_recv(), Ok(()));
            let total = rx.quit.len() + rx.update.len() + rx.show_logs.len() + rx.do_first_use.len();
            assert_eq!(total, 0, "exactly one signal for {action}");
        }
    }

    #[test]
    fn menu_commands_without_listener_are_dropped() {
        let (session, rx) = session();
        drop(rx);
        for id in [QUIT_MENU_ID, UPDATE_MENU_ID, LOGS_MENU_ID, GET_STARTED_MENU_ID] {
            assert_eq!(session.handle(command(id)), Dispatch::Handled);
        }
    }

    #[test]
    fn unknown_menu_id_is_ignored() {
        let (session, rx) = session();
        assert_eq!(session.handle(command(77)), Dispatch::Handled);
        assert!(rx.quit.is_empty() && rx.update.is_empty());
        assert!(rx.show_logs.is_empty() && rx.do_first_use.is_empty());
    }

    #[test]
    fn close_destroys_window_and_unregisters_class() {
        let (session, _rx) = session();
        session.handle(RawMessage::new(WM_CLOSE, 0, 0));
        assert_eq!(
            session.platform().calls(),
            vec!["destroy_window", "unregister_class"]
        );
        assert!(session.icon().is_some());
    }

    #[test]
    fn destroy_deletes_icon_posts_quit_and_enters_closing() {
        let (session, _rx) = session();
        session.set_state(SessionState::Running);
        session.handle(RawMessage::new(WM_DESTROY, 0, 0));

        assert_eq!(session.platform().calls(), vec!["delete_icon", "post_quit"]);
        assert!(session.icon().is_none());
        assert_eq!(session.state(), SessionState::Closing);
    }

    #[test]
    fn end_session_deletes_icon_without_quitting() {
        let (session, _rx) = session();
        session.set_state(SessionState::Running);
        session.handle(RawMessage::new(WM_ENDSESSION, 1, 0));

        assert_eq!(session.platform().calls(), vec!["delete_icon"]);
        assert!(session.icon().is_none());
        assert_eq!(session.state(), SessionState::Running);

        // A following destroy has no icon left to delete but still unwinds.
        session.handle(RawMessage::new(WM_DESTROY, 0, 0));
        assert_eq!(session.platform().calls(), vec!["delete_icon", "post_quit"]);
    }

    #[test]
    fn clicks_open_menu_and_hover_is_ignored() {
        let (session, _rx) = session();
        session.handle(icon_event(WM_MOUSEMOVE));
        session.handle(icon_event(WM_RBUTTONUP));
        session.handle(icon_event(WM_LBUTTONUP));
        assert_eq!(
            session.platform().calls(),
            vec!["show_menu(update=false)", "show_menu(update=false)"]
        );
    }

    #[test]
    fn notification_click_routes_to_first_use_until_update_pending() {
        let (session, rx) = session();
        session.handle(icon_event(NIN_BALLOONUSERCLICK));
        assert_eq!(rx.do_first_use.try_recv(), Ok(()));
        assert!(rx.update.is_empty());

        session.mark_update_pending("2.0");
        session.handle(icon_event(NIN_BALLOONUSERCLICK));
        assert_eq!(rx.update.try_recv(), Ok(()));
        assert!(rx.do_first_use.is_empty());
    }

    #[test]
    fn notification_dismissed_is_a_no_op() {
        let (session, rx) = session();
        assert_eq!(session.handle(icon_event(NIN_BALLOONTIMEOUT)), Dispatch::Handled);
        assert!(session.platform().calls().is_empty());
        assert!(rx.update.is_empty() && rx.do_first_use.is_empty());
    }

    #[test]
    fn taskbar_created_re_adds_icon() {
        let (session, _rx) = session();
        session.show_icon().unwrap();
        let taskbar = session.message_ids().taskbar_created;
        session.handle(RawMessage::new(taskbar, 0, 0));
        assert_eq!(session.platform().count("add_icon"), 2);
        assert!(session.icon().unwrap().registered);
    }

    #[test]
    fn taskbar_created_failure_is_logged_not_fatal() {
        let (session, _rx) = session();
        session.platform().fail_add.store(true, Ordering::SeqCst);
        let taskbar = session.message_ids().taskbar_created;
        assert_eq!(session.handle(RawMessage::new(taskbar, 0, 0)), Dispatch::Handled);
        assert!(!session.icon().unwrap().registered);
    }

    #[test]
    fn unrecognised_messages_fall_through_to_default() {
        let (session, _rx) = session();
        assert_eq!(session.handle(RawMessage::new(0x000F, 0, 0)), Dispatch::Default);
        assert!(session.platform().calls().is_empty());
    }

    #[test]
    fn mark_update_pending_updates_icon_once() {
        let (session, _rx) = session();
        session.mark_update_pending("2.0");
        session.mark_update_pending("2.0");

        assert!(session.is_update_pending());
        assert_eq!(session.platform().count("modify_icon"), 1);
        let icon = session.icon().unwrap();
        assert!(icon.tooltip.contains("2.0"));
        assert!(icon.balloon.is_some());

        session.handle(icon_event(WM_RBUTTONUP));
        assert_eq!(session.platform().count("show_menu(update=true)"), 1);
    }

    #[test]
    fn quit_posts_close_once_under_concurrency() {
        let (session, _rx) = session();
        let session = Arc::new(session);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || session.quit())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(session.platform().count("post_close"), 1);
    }
}
