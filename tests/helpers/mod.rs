use std::collections::HashMap;
use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::Mutex;

use anyhow::Result;
use camino::Utf8PathBuf;
use virtstage::executor::{CommandExecutor, CommandSpec, ExecutionResult};
use virtstage::guest::{DiskDevice, DiskRole, Guest};

/// Scripted outcome for one command name.
#[derive(Debug, Clone)]
pub struct MockOutcome {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl MockOutcome {
    #[allow(dead_code)]
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    #[allow(dead_code)]
    pub fn failure(exit_code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }
}

/// Command executor that records every spec it receives and replays
/// scripted outcomes. Commands without a scripted outcome succeed with
/// empty output.
#[derive(Debug, Default)]
pub struct MockExecutor {
    calls: Mutex<Vec<CommandSpec>>,
    outcomes: Mutex<HashMap<String, MockOutcome>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn with_outcome(self, command: impl Into<String>, outcome: MockOutcome) -> Self {
        self.outcomes
            .lock()
            .expect("outcomes lock poisoned")
            .insert(command.into(), outcome);
        self
    }

    /// Scripts the same outcome for every known ISO-9660 builder, so the
    /// test passes regardless of which tool the host happens to have.
    #[allow(dead_code)]
    pub fn with_iso_outcome(self, outcome: MockOutcome) -> Self {
        {
            let mut outcomes = self.outcomes.lock().expect("outcomes lock poisoned");
            for tool in ["xorrisofs", "genisoimage", "mkisofs"] {
                outcomes.insert(tool.to_string(), outcome.clone());
            }
        }
        self
    }

    /// Returns a copy of every spec executed so far, in order.
    #[allow(dead_code)]
    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().expect("calls lock poisoned").clone()
    }
}

impl CommandExecutor for MockExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<ExecutionResult> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push(spec.clone());
        let outcome = self
            .outcomes
            .lock()
            .expect("outcomes lock poisoned")
            .get(&spec.command)
            .cloned()
            .unwrap_or(MockOutcome {
                exit_code: 0,
                stdout: Vec::new(),
                stderr: Vec::new(),
            });
        Ok(ExecutionResult {
            status: Some(ExitStatus::from_raw(outcome.exit_code << 8)),
            stdout: outcome.stdout,
            stderr: outcome.stderr,
        })
    }
}

/// Test helper to build a guest with the given devices.
#[allow(dead_code)]
pub fn guest_with_devices(devices: Vec<DiskDevice>) -> Guest {
    Guest {
        name: "testguest".to_string(),
        devices,
    }
}

/// Test helper for a guest with a single plain disk.
#[allow(dead_code)]
pub fn guest_with_one_disk() -> Guest {
    guest_with_devices(vec![DiskDevice::new("/var/lib/images/a.qcow2", DiskRole::Disk)])
}

/// Test helper for a guest with no devices at all.
#[allow(dead_code)]
pub fn diskless_guest() -> Guest {
    guest_with_devices(Vec::new())
}

/// Converts a tempdir path into a Utf8PathBuf, panicking on non-UTF-8.
#[allow(dead_code)]
pub fn utf8_path(path: &std::path::Path) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(path.to_path_buf()).expect("temp path should be valid UTF-8")
}
