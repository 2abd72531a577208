use std::io;
use std::process::Command;

/// Host process lookup and termination, used by confirmed `kill` actions.
pub trait ProcessControl: Send + Sync {
    /// `Ok(None)` when no process with `pid` exists.
    fn process_name(&self, pid: u32) -> io::Result<Option<String>>;
    fn terminate(&self, pid: u32) -> io::Result<()>;
}

/// Forwards to the host's process tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostProcessControl;

fn failure_message(output: &std::process::Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    }
}

#[cfg(unix)]
impl ProcessControl for HostProcessControl {
    fn process_name(&self, pid: u32) -> io::Result<Option<String>> {
        let output = Command::new("ps")
            .args(["-p", &pid.to_string(), "-o", "comm="])
            .output()?;
        if !output.status.success() {
            return Ok(None);
        }
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!name.is_empty()).then_some(name))
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        let output = Command::new("kill")
            .args(["-TERM", &pid.to_string()])
            .output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(io::Error::other(failure_message(&output)))
        }
    }
}

#[cfg(windows)]
impl ProcessControl for HostProcessControl {
    fn process_name(&self, pid: u32) -> io::Result<Option<String>> {
        let output = Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/FO", "CSV", "/NH"])
            .output()?;
        if !output.status.success() {
            return Ok(None);
        }
        let stdout = String::from_utf8_lossy(&output.stdout);
        let quoted_pid = format!("\"{pid}\"");
        Ok(stdout
            .lines()
            .find(|line| line.contains(&quoted_pid))
            .and_then(|line| line.split(',').next())
            .map(|name| name.trim_matches('"').to_string()))
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        let output = Command::new("taskkill")
            .args(["/PID", &pid.to_string()])
            .output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(io::Error::other(failure_message(&output)))
        }
    }
}
