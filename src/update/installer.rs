//! Installer handoff.
//!
//! Launches the staged installer as a detached process and then ends the
//! current process, because the installer replaces the running binaries and
//! needs the application out of the way. Spawning and exiting are both
//! capabilities so tests can substitute them.

use crate::error::{LanternError, Result};
use crate::update::staging::StagingArea;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Flags for a prompt-free install that closes running instances of the app.
pub const INSTALLER_ARGS: [&str; 4] = [
    // No "ready to install" confirmation page.
    "/SP",
    "/SILENT",
    "/SUPPRESSMSGBOXES",
    // Close running instances of the tray app.
    "/CLOSEAPPLICATIONS",
];

/// Starts a program without keeping a handle on it.
pub trait ProcessSpawner {
    /// Spawn `program` with `args` detached from the current process and
    /// return its process id.
    fn spawn_detached(&self, program: &Path, args: &[&str]) -> std::io::Result<u32>;
}

/// Ends the current process.
pub trait Terminator {
    /// Exit with `code`. The production implementation never returns.
    fn exit(&self, code: i32);
}

/// Spawns real OS processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawner;

impl ProcessSpawner for SystemSpawner {
    fn spawn_detached(&self, program: &Path, args: &[&str]) -> std::io::Result<u32> {
        let mut command = std::process::Command::new(program);
        command
            .args(args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());

        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            use windows_sys::Win32::System::Threading::{
                CREATE_NEW_PROCESS_GROUP, DETACHED_PROCESS,
            };
            command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
        }

        // Dropping the child releases our handle without waiting on it.
        let child = command.spawn()?;
        Ok(child.id())
    }
}

/// Exits via [`std::process::exit`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessExit;

impl Terminator for ProcessExit {
    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}

/// Launches the staged installer and hands the process over to it.
pub struct InstallerLauncher<P: ProcessSpawner = SystemSpawner, X: Terminator = ProcessExit> {
    installer: PathBuf,
    spawner: P,
    terminator: X,
}

impl InstallerLauncher {
    /// Launcher for `installer_name` inside `staging`, using real processes.
    pub fn new(staging: &StagingArea, installer_name: &str) -> Self {
        Self::with_capabilities(staging, installer_name, SystemSpawner, ProcessExit)
    }
}

impl<P: ProcessSpawner, X: Terminator> InstallerLauncher<P, X> {
    pub fn with_capabilities(
        staging: &StagingArea,
        installer_name: &str,
        spawner: P,
        terminator: X,
    ) -> Self {
        Self {
            installer: staging.file_path(installer_name),
            spawner,
            terminator,
        }
    }

    /// Expected installer location.
    pub fn installer_path(&self) -> &Path {
        &self.installer
    }

    /// Whether an installer is staged and ready to launch.
    pub fn is_staged(&self) -> bool {
        self.installer.is_file()
    }

    /// Spawn the installer detached, then terminate this process with status 0.
    ///
    /// Only returns `Ok` when the terminator returns (test substitutes).
    ///
    /// # Errors
    ///
    /// Returns an error naming the expected path if the installer is missing,
    /// or if the installer process cannot be started. The process keeps
    /// running in both cases.
    pub fn launch(&self) -> Result<()> {
        match std::fs::metadata(&self.installer) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LanternError::Installer(format!(
                    "could not locate installer at {}",
                    self.installer.display()
                )));
            }
            Err(e) => {
                return Err(LanternError::Installer(format!(
                    "cannot inspect installer at {}: {e}",
                    self.installer.display()
                )));
            }
        }
        debug!("attempting to start installer {}", self.installer.display());

        let pid = self
            .spawner
            .spawn_detached(&self.installer, &INSTALLER_ARGS)
            .map_err(|e| {
                LanternError::Installer(format!(
                    "unable to start installer {}: {e}",
                    self.installer.display()
                ))
            })?;

        info!(pid, "installer started in background, exiting");
        self.terminator.exit(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSpawner {
        calls: RefCell<Vec<(PathBuf, Vec<String>)>>,
        fail: bool,
    }

    impl ProcessSpawner for RecordingSpawner {
        fn spawn_detached(&self, program: &Path, args: &[&str]) -> std::io::Result<u32> {
            self.calls.borrow_mut().push((
                program.to_owned(),
                args.iter().map(|a| (*a).to_owned()).collect(),
            ));
            if self.fail {
                Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "access denied",
                ))
            } else {
                Ok(4242)
            }
        }
    }

    #[derive(Default)]
    struct RecordingExit {
        codes: RefCell<Vec<i32>>,
    }

    impl Terminator for RecordingExit {
        fn exit(&self, code: i32) {
            self.codes.borrow_mut().push(code);
        }
    }

    fn launcher(
        dir: &Path,
        spawner: RecordingSpawner,
    ) -> InstallerLauncher<RecordingSpawner, RecordingExit> {
        InstallerLauncher::with_capabilities(
            &StagingArea::new(dir),
            "LanternSetup.exe",
            spawner,
            RecordingExit::default(),
        )
    }

    #[test]
    fn missing_installer_is_reported_with_path_and_never_spawns() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = launcher(dir.path(), RecordingSpawner::default());

        let err = launcher.launch().unwrap_err();
        let expected = dir.path().join("LanternSetup.exe");
        assert!(matches!(err, LanternError::Installer(_)));
        assert!(
            err.to_string().contains(&expected.display().to_string()),
            "error was: {err}"
        );
        assert!(launcher.spawner.calls.borrow().is_empty());
        assert!(launcher.terminator.codes.borrow().is_empty());
        assert!(!launcher.is_staged());
    }

    #[test]
    fn staged_installer_is_spawned_with_silent_flags_then_exits_zero() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("LanternSetup.exe"), b"MZ").unwrap();
        let launcher = launcher(dir.path(), RecordingSpawner::default());
        assert!(launcher.is_staged());

        launcher.launch().unwrap();

        let calls = launcher.spawner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, dir.path().join("LanternSetup.exe"));
        assert_eq!(
            calls[0].1,
            vec!["/SP", "/SILENT", "/SUPPRESSMSGBOXES", "/CLOSEAPPLICATIONS"]
        );
        assert_eq!(*launcher.terminator.codes.borrow(), vec![0]);
    }

    #[test]
    fn spawn_failure_is_returned_without_exiting() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("LanternSetup.exe"), b"MZ").unwrap();
        let launcher = launcher(
            dir.path(),
            RecordingSpawner {
                fail: true,
                ..Default::default()
            },
        );

        let err = launcher.launch().unwrap_err();
        assert!(err.to_string().contains("unable to start installer"));
        assert!(launcher.terminator.codes.borrow().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn system_spawner_starts_real_process() {
        let pid = SystemSpawner
            .spawn_detached(Path::new("/bin/sh"), &["-c", "exit 0"])
            .unwrap();
        assert!(pid > 0);
    }

    #[test]
    fn system_spawner_reports_missing_program() {
        let result = SystemSpawner.spawn_detached(Path::new("/nonexistent/lantern-installer"), &[]);
        assert!(result.is_err());
    }
}
