//! A running component process and its output relay.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;

use super::Component;

#[cfg(unix)]
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Owns a spawned component. Dropping it kills the child.
pub struct ProcessHandle {
    component: Component,
    child: Child,
    relay: Option<JoinHandle<usize>>,
}

impl ProcessHandle {
    /// Spawn `program args` in `dir` with piped output and no stdin.
    pub fn spawn(component: Component, program: &Path, args: &[OsString], dir: &Path) -> Result<Self> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning {} '{}'", component.name(), program.display()))?;
        let relay = tokio::spawn(relay_output(
            component.tag(),
            child.stdout.take(),
            child.stderr.take(),
        ));

        Ok(Self {
            component,
            child,
            relay: Some(relay),
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Whether the child has exited on its own.
    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Terminate gracefully, force-kill after `grace`, then drain the relay.
    ///
    /// Returns the number of output lines relayed over the process lifetime.
    pub async fn stop(mut self, grace: Duration) -> usize {
        let name = self.component.name();
        if self.has_exited() {
            println!("[launcher] {} already exited", name);
        } else {
            self.terminate().await;
            match tokio::time::timeout(grace, self.child.wait()).await {
                Ok(_) => println!("[launcher] {} stopped", name),
                Err(_) => {
                    println!("  [WARN] {} did not exit in {:?}, killing", name, grace);
                    // already gone is fine
                    let _ = self.child.kill().await;
                }
            }
        }

        let Some(relay) = self.relay.take() else {
            return 0;
        };
        let abort = relay.abort_handle();
        match tokio::time::timeout(grace, relay).await {
            Ok(Ok(lines)) => lines,
            Ok(Err(_)) => 0,
            Err(_) => {
                abort.abort();
                0
            }
        }
    }

    #[cfg(unix)]
    async fn terminate(&mut self) {
        let Some(pid) = self.child.id() else {
            return;
        };
        let pid = Pid::from_u32(pid);
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        let sent = sys
            .process(pid)
            .and_then(|process| process.kill_with(Signal::Term))
            .unwrap_or(false);
        if !sent {
            let _ = self.child.start_kill();
        }
    }

    #[cfg(windows)]
    async fn terminate(&mut self) {
        if let Some(pid) = self.child.id() {
            let _ = Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/T"])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .creation_flags(CREATE_NO_WINDOW)
                .status()
                .await;
        }
    }

    #[cfg(not(any(unix, windows)))]
    async fn terminate(&mut self) {
        let _ = self.child.start_kill();
    }
}

/// Print every line of both streams prefixed with `tag`; ends at EOF on both.
///
/// Lines need not be UTF-8. Invalid bytes are replaced, and the stream keeps
/// being drained so the child never writes to a closed pipe.
async fn relay_output(
    tag: &'static str,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
) -> usize {
    let mut out = stdout.map(BufReader::new);
    let mut err = stderr.map(BufReader::new);
    let mut relayed = 0;

    loop {
        tokio::select! {
            line = next_line(&mut out), if out.is_some() => match line {
                Some(line) => {
                    println!("{} {}", tag, line);
                    relayed += 1;
                }
                None => out = None,
            },
            line = next_line(&mut err), if err.is_some() => match line {
                Some(line) => {
                    eprintln!("{} {}", tag, line);
                    relayed += 1;
                }
                None => err = None,
            },
            else => break,
        }
    }
    relayed
}

/// Next line without its terminator; `None` at EOF or on a read error.
async fn next_line<R>(reader: &mut Option<R>) -> Option<String>
where
    R: AsyncBufRead + Unpin,
{
    let reader = reader.as_mut()?;
    let mut buf = Vec::new();
    match reader.read_until(b'\n', &mut buf).await {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let line = String::from_utf8_lossy(&buf);
            Some(line.trim_end_matches(['\r', '\n']).to_string())
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_relay_counts_both_streams() {
        let temp = TempDir::new().unwrap();
        let prog = script(temp.path(), "chatty", "echo one; echo two >&2; echo three");
        let mut handle =
            ProcessHandle::spawn(Component::Overlay, &prog, &[], temp.path()).unwrap();
        while !handle.has_exited() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(handle.stop(Duration::from_secs(5)).await, 3);
    }

    #[tokio::test]
    async fn test_relay_survives_non_utf8_output() {
        let temp = TempDir::new().unwrap();
        let marker = temp.path().join("finished");
        let body = format!(
            "printf 'caf\\351\\n'\necho line1\necho line2\necho line3\ntouch '{}'",
            marker.display()
        );
        let prog = script(temp.path(), "latin1", &body);
        let mut handle = ProcessHandle::spawn(Component::Gui, &prog, &[], temp.path()).unwrap();
        while !handle.has_exited() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(handle.stop(Duration::from_secs(5)).await, 4);
        assert!(marker.exists(), "child died before finishing its output");
    }

    #[tokio::test]
    async fn test_stop_terminates_long_running_child() {
        let temp = TempDir::new().unwrap();
        let prog = script(temp.path(), "sleepy", "echo started\nexec sleep 30");
        let handle = ProcessHandle::spawn(Component::Gui, &prog, &[], temp.path()).unwrap();
        assert!(handle.pid().is_some());

        let started = std::time::Instant::now();
        handle.stop(Duration::from_secs(5)).await;
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_stop_kills_child_ignoring_sigterm() {
        let temp = TempDir::new().unwrap();
        let prog = script(
            temp.path(),
            "stubborn",
            "trap '' TERM\necho ready\nwhile true; do sleep 1; done",
        );
        let handle = ProcessHandle::spawn(Component::Gui, &prog, &[], temp.path()).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = std::time::Instant::now();
        handle.stop(Duration::from_millis(500)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
