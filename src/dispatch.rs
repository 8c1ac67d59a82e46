use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::DispatchError;
use crate::gesture::GestureLabel;

/// Side-effect boundary for the capture loop: hand off the bound action and
/// return before it finishes. A launch failure is an error; whatever the
/// action does afterwards is its own business.
pub trait ActionLauncher: Send {
    fn launch(&mut self, label: GestureLabel, action: &str) -> Result<(), DispatchError>;
}

/// Runs the bound command through the system shell, fire-and-forget. The
/// loop only pays for the `spawn`; a detached reaper waits on the child so
/// finished actions do not pile up as zombies.
pub struct ShellLauncher;

impl ShellLauncher {
    fn shell_command(action: &str) -> Command {
        #[cfg(windows)]
        {
            let mut command = Command::new("cmd");
            command.args(["/C", action]);
            command
        }
        #[cfg(not(windows))]
        {
            let mut command = Command::new("sh");
            command.args(["-c", action]);
            command
        }
    }
}

impl ActionLauncher for ShellLauncher {
    fn launch(&mut self, label: GestureLabel, action: &str) -> Result<(), DispatchError> {
        let mut command = Self::shell_command(action);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        let mut child = command.spawn().map_err(|e| DispatchError {
            action: action.to_string(),
            reason: e.to_string(),
        })?;
        debug!(%label, action, pid = child.id(), "launched action");
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

/// Test double that records every launch instead of running anything.
#[cfg(test)]
pub struct RecordingLauncher {
    pub launched: std::sync::Arc<std::sync::Mutex<Vec<(GestureLabel, String)>>>,
    pub fail_with: Option<String>,
}

#[cfg(test)]
impl RecordingLauncher {
    pub fn new() -> (Self, std::sync::Arc<std::sync::Mutex<Vec<(GestureLabel, String)>>>) {
        let launched = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        (
            Self {
                launched: launched.clone(),
                fail_with: None,
            },
            launched,
        )
    }
}

#[cfg(test)]
impl ActionLauncher for RecordingLauncher {
    fn launch(&mut self, label: GestureLabel, action: &str) -> Result<(), DispatchError> {
        if let Some(reason) = &self.fail_with {
            return Err(DispatchError {
                action: action.to_string(),
                reason: reason.clone(),
            });
        }
        self.launched
            .lock()
            .expect("recording launcher lock poisoned")
            .push((label, action.to_string()));
        Ok(())
    }
}
