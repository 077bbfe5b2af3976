// Process plumbing: fork, exec, descriptor installation and waiting.
use crate::engine::context::Environment;
use log::{error, trace, warn};
use nix::errno::Errno;
use nix::fcntl::{FcntlArg, FdFlag, fcntl};
use nix::sys::signal::{SigHandler, Signal, signal};
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, dup2, execve, fork};
use std::ffi::{CString, NulError};
use std::os::fd::{AsRawFd, IntoRawFd, RawFd};

/// Status reported for anything that did not end in a normal exit.
pub const STATUS_FAILURE: i32 = -1;
pub const EXIT_CANNOT_EXECUTE: i32 = 126;
pub const EXIT_NOT_FOUND: i32 = 127;

/// Forks the shell.
pub(crate) fn fork_process() -> nix::Result<ForkResult> {
    // SAFETY: the child never returns into the caller. It adjusts its descriptors, runs
    // its own copy of the command subtree and leaves through `exec` or `terminate`.
    unsafe { fork() }
}

/// Ends a forked child without running the parent's exit handlers a second time.
pub(crate) fn terminate(status: i32) -> ! {
    // SAFETY: `_exit` skips atexit handlers and stdio flushing; nothing else is touched.
    unsafe { nix::libc::_exit(status) }
}

/// Puts SIGPIPE back to its default action. The Rust runtime starts the shell with it
/// ignored, and an ignored disposition survives `execve`.
fn restore_sigpipe() {
    // SAFETY: SIG_DFL installs no Rust code as a handler.
    if let Err(e) = unsafe { signal(Signal::SIGPIPE, SigHandler::SigDfl) } {
        eprintln!("treesh: cannot reset SIGPIPE: {}", e.desc());
    }
}

/// Blocks until `pid` finishes and converts its state into a status.
pub(crate) fn wait_for(pid: Pid) -> i32 {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                trace!("process {} exited with {}", pid, code);
                return code;
            }
            Ok(WaitStatus::Signaled(_, signal, core_dumped)) => {
                warn!(
                    "process {} terminated by {:?}{}",
                    pid,
                    signal,
                    if core_dumped { " (core dumped)" } else { "" }
                );
                return STATUS_FAILURE;
            }
            Ok(other) => {
                warn!("process {} ended in unexpected state {:?}", pid, other);
                return STATUS_FAILURE;
            }
            Err(Errno::EINTR) => continue,
            Err(e) => {
                error!("Failed to wait for process {}: {}", pid, e);
                return STATUS_FAILURE;
            }
        }
    }
}

/// Moves `source` onto descriptor `target` (stdin or stdout) and closes the original.
///
/// Consumes `source` so the original descriptor is closed exactly once.
pub(crate) fn install_fd<F: AsRawFd + IntoRawFd>(source: F, target: RawFd) -> nix::Result<()> {
    if source.as_raw_fd() == target {
        // Already in place; keep it open across exec instead of closing it.
        let fd = source.into_raw_fd();
        fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty()))?;
        return Ok(());
    }
    dup2(source.as_raw_fd(), target)?;
    drop(source);
    Ok(())
}

/// Everything `execve` needs, converted before forking so the child only has to exec.
pub(crate) struct ExecImage {
    path: CString,
    argv: Vec<CString>,
    envp: Vec<CString>,
}

impl ExecImage {
    pub(crate) fn new(argv: &[String], env: &Environment) -> Result<Self, NulError> {
        let argv = argv
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let path = argv.first().cloned().unwrap_or_default();
        Ok(Self {
            path,
            argv,
            envp: env.to_envp(),
        })
    }

    /// Replaces the current process image. Only returns control by terminating the
    /// process with 127 (not found) or 126 (could not execute).
    pub(crate) fn exec(&self) -> ! {
        restore_sigpipe();
        let err = match execve(&self.path, &self.argv, &self.envp) {
            Ok(never) => match never {},
            Err(e) => e,
        };
        eprintln!("treesh: {}: {}", self.path.to_string_lossy(), err.desc());
        let status = match err {
            Errno::ENOENT | Errno::ENOTDIR => EXIT_NOT_FOUND,
            _ => EXIT_CANNOT_EXECUTE,
        };
        terminate(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_image_rejects_nul_bytes() {
        let env = Environment::new();
        let argv = vec!["echo".to_string(), "a\0b".to_string()];
        assert!(ExecImage::new(&argv, &env).is_err());
    }

    #[test]
    fn test_exec_image_uses_first_word_as_path() {
        let env: Environment = [("LANG", "C")].into_iter().collect();
        let argv = vec!["/bin/echo".to_string(), "hi".to_string()];
        let image = ExecImage::new(&argv, &env).unwrap();
        assert_eq!(image.path.to_str().unwrap(), "/bin/echo");
        assert_eq!(image.argv.len(), 2);
        assert_eq!(image.envp[0].to_str().unwrap(), "LANG=C");
    }

    #[test]
    fn test_wait_for_reports_exit_code() {
        let image = ExecImage::new(
            &["/bin/sh".to_string(), "-c".to_string(), "exit 7".to_string()],
            &Environment::new(),
        )
        .unwrap();
        match fork_process().unwrap() {
            ForkResult::Child => image.exec(),
            ForkResult::Parent { child } => assert_eq!(wait_for(child), 7),
        }
    }

    #[test]
    fn test_wait_for_maps_signal_death_to_failure() {
        let image = ExecImage::new(
            &["/bin/sh".to_string(), "-c".to_string(), "kill -9 $$".to_string()],
            &Environment::new(),
        )
        .unwrap();
        match fork_process().unwrap() {
            ForkResult::Child => image.exec(),
            ForkResult::Parent { child } => assert_eq!(wait_for(child), STATUS_FAILURE),
        }
    }
}
