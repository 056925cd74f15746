use anyhow::{Context, Result};
use std::io::{self, Read};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const WAIT_STEP: Duration = Duration::from_millis(25);

/// Render a command line for logs and error messages
pub fn display(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|s| s.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a command and capture its output, whatever the exit status
pub fn capture(cmd: &mut Command) -> Result<Output> {
    log::trace!("Running: {}", display(cmd));
    cmd.stdin(Stdio::null())
        .output()
        .with_context(|| format!("Failed to execute: {}", display(cmd)))
}

/// Run a command, killing it once `timeout` elapses.
///
/// Returns `Ok(None)` when the deadline was hit.
pub fn capture_with_timeout(cmd: &mut Command, timeout: Duration) -> io::Result<Option<Output>> {
    log::trace!("Running with {}s deadline: {}", timeout.as_secs(), display(cmd));
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // drain both pipes so a chatty child never blocks on a full buffer
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if Instant::now() >= deadline {
            kill(&mut child);
            break None;
        }
        thread::sleep(WAIT_STEP);
    };

    let stdout = stdout.join().unwrap_or_default();
    let stderr = stderr.join().unwrap_or_default();

    Ok(status.map(|status| Output {
        status,
        stdout,
        stderr,
    }))
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("Could not kill child {}: {}", child.id(), e);
    }
    let _ = child.wait();
}

/// Check if a command exists
pub fn command_exists(cmd: &str) -> bool {
    Command::new("which")
        .arg(cmd)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let mut cmd = Command::new("aws");
        cmd.args(["lightsail", "get-instances", "--output", "json"]);
        assert_eq!(display(&cmd), "aws lightsail get-instances --output json");
    }

    #[test]
    fn test_capture_collects_output() {
        let output = capture(Command::new("sh").args(["-c", "echo out; echo err >&2; exit 3"])).unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout), "out\n");
        assert_eq!(String::from_utf8_lossy(&output.stderr), "err\n");
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_capture_with_timeout_finishes() {
        let output = capture_with_timeout(
            Command::new("sh").args(["-c", "echo hello"]),
            Duration::from_secs(5),
        )
        .unwrap()
        .unwrap();
        assert!(output.status.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout), "hello\n");
    }

    #[test]
    fn test_capture_with_timeout_kills() {
        let started = Instant::now();
        let output =
            capture_with_timeout(Command::new("sleep").arg("5"), Duration::from_millis(200)).unwrap();
        assert!(output.is_none());
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_command_exists() {
        assert!(command_exists("sh"));
        assert!(!command_exists("definitely-not-a-real-command-sailfleet"));
    }
}
