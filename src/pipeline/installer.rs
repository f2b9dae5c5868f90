//! Installer resolution and invocation.

use super::shutdown::Shutdown;
use crate::LaunchError;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Find the installer entry point named `name` at the top level of `dir`.
///
/// Symlinks are followed. On Unix at least one execute bit must be set.
///
/// # Errors
///
/// - `InstallerMissing` if there is no regular file at `dir/name`
/// - `InstallerNotExecutable` if the file has no execute permission
pub fn resolve_installer(dir: &Path, name: &str) -> Result<PathBuf, LaunchError> {
    let path = dir.join(name);
    let metadata = match fs::metadata(&path) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(LaunchError::InstallerMissing { path }),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if metadata.permissions().mode() & 0o111 == 0 {
            return Err(LaunchError::InstallerNotExecutable { path });
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;

    Ok(path)
}

enum Outcome {
    Exited(Result<ExitStatus, LaunchError>),
    Interrupted,
}

/// Run the installer with `dir` as its working directory and wait for it.
///
/// Standard streams are inherited so the installer talks to the user
/// directly. Returns the installer's exit code, zero or not. A signal seen by
/// `shutdown` kills the installer.
pub(crate) async fn run_installer(
    installer: &Path,
    dir: &Path,
    args: &[OsString],
    limit: Option<Duration>,
    shutdown: &mut Shutdown,
) -> Result<i32, LaunchError> {
    let mut command = Command::new(installer);
    command
        .args(args)
        .current_dir(dir)
        .kill_on_drop(true)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());

    let mut child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            LaunchError::InstallerNotExecutable {
                path: installer.to_path_buf(),
            }
        } else {
            LaunchError::InstallerSpawn {
                message: format!("{}: {e}", installer.display()),
            }
        }
    })?;
    debug!(installer = %installer.display(), pid = ?child.id(), "Installer started");

    let outcome = tokio::select! {
        status = wait_with_limit(&mut child, limit) => Outcome::Exited(status),
        () = shutdown.recv() => Outcome::Interrupted,
    };

    let status = match outcome {
        Outcome::Exited(Ok(status)) => status,
        Outcome::Exited(Err(error)) => {
            stop(&mut child).await;
            return Err(error);
        }
        Outcome::Interrupted => {
            warn!("Shutdown signal received, stopping installer");
            stop(&mut child).await;
            return Err(LaunchError::Interrupted);
        }
    };

    match status.code() {
        Some(code) => {
            info!(exit_code = code, "Installer finished");
            Ok(code)
        }
        None => Err(LaunchError::InstallerTerminated {
            signal: terminating_signal(&status),
        }),
    }
}

async fn wait_with_limit(
    child: &mut Child,
    limit: Option<Duration>,
) -> Result<ExitStatus, LaunchError> {
    let waited = match limit {
        Some(duration) => timeout(duration, child.wait())
            .await
            .map_err(|_| LaunchError::Timeout { duration })?,
        None => child.wait().await,
    };
    waited.map_err(|e| LaunchError::InstallerSpawn {
        message: format!("failed waiting for installer: {e}"),
    })
}

async fn stop(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!("Failed to kill installer: {e}");
    }
}

#[cfg(unix)]
fn terminating_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: &ExitStatus) -> Option<i32> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn write_script(dir: &Path, name: &str, body: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[test]
    fn test_resolve_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = resolve_installer(dir.path(), "installer");
        assert!(matches!(result, Err(LaunchError::InstallerMissing { .. })));
    }

    #[test]
    fn test_resolve_directory_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("installer")).unwrap();
        let result = resolve_installer(dir.path(), "installer");
        assert!(matches!(result, Err(LaunchError::InstallerMissing { .. })));
    }

    #[test]
    fn test_resolve_not_executable() {
        let dir = tempfile::tempdir().unwrap();
        write_script(dir.path(), "installer", "exit 0", 0o644);
        let result = resolve_installer(dir.path(), "installer");
        assert!(matches!(
            result,
            Err(LaunchError::InstallerNotExecutable { .. })
        ));
    }

    #[test]
    fn test_resolve_ok() {
        let dir = tempfile::tempdir().unwrap();
        let expected = write_script(dir.path(), "installer", "exit 0", 0o755);
        assert_eq!(resolve_installer(dir.path(), "installer").unwrap(), expected);
    }

    #[tokio::test]
    async fn test_exit_code_forwarded() {
        let dir = tempfile::tempdir().unwrap();
        let installer = write_script(dir.path(), "installer", "exit 7", 0o755);
        let mut shutdown = Shutdown::listen();
        let code = run_installer(&installer, dir.path(), &[], None, &mut shutdown)
            .await
            .unwrap();
        assert_eq!(code, 7);
    }

    #[tokio::test]
    async fn test_runs_in_directory_with_args() {
        let dir = tempfile::tempdir().unwrap();
        let installer = write_script(
            dir.path(),
            "installer",
            "pwd -P > cwd.txt\necho \"$1\" > arg.txt",
            0o755,
        );
        let code = run_installer(
            &installer,
            dir.path(),
            &[OsString::from("--prefix=/opt")],
            None,
            &mut Shutdown::listen(),
        )
        .await
        .unwrap();
        assert_eq!(code, 0);

        let cwd = fs::read_to_string(dir.path().join("cwd.txt")).unwrap();
        assert_eq!(
            fs::canonicalize(cwd.trim()).unwrap(),
            fs::canonicalize(dir.path()).unwrap()
        );
        let arg = fs::read_to_string(dir.path().join("arg.txt")).unwrap();
        assert_eq!(arg.trim(), "--prefix=/opt");
    }

    #[tokio::test]
    async fn test_timeout_kills_installer() {
        let dir = tempfile::tempdir().unwrap();
        let installer = write_script(dir.path(), "installer", "sleep 5", 0o755);
        let result = run_installer(
            &installer,
            dir.path(),
            &[],
            Some(Duration::from_millis(200)),
            &mut Shutdown::listen(),
        )
        .await;
        assert!(matches!(result, Err(LaunchError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_killed_by_signal() {
        let dir = tempfile::tempdir().unwrap();
        let installer = write_script(dir.path(), "installer", "kill -9 $$", 0o755);
        let mut shutdown = Shutdown::listen();
        let result = run_installer(&installer, dir.path(), &[], None, &mut shutdown).await;
        match result {
            Err(LaunchError::InstallerTerminated { signal }) => assert_eq!(signal, Some(9)),
            other => panic!("expected InstallerTerminated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("installer");
        fs::write(&path, "#!/nonexistent/interpreter\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

        let mut shutdown = Shutdown::listen();
        let result = run_installer(&path, dir.path(), &[], None, &mut shutdown).await;
        assert!(matches!(result, Err(LaunchError::InstallerSpawn { .. })));
    }
}
