use std::io::{self, Read, Write};
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, error};
use serde::{Deserialize, Serialize};
use serde_json::Deserializer;

use crate::pool::Job;
use crate::Result;

/// Description of an external command to run as a pool job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program to execute, looked up in `PATH`.
    pub program: String,
    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,
    /// Label used in log messages. Defaults to the program name.
    #[serde(default)]
    pub name: Option<String>,
}

impl CommandSpec {
    /// Returns the label used to identify this command in logs.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.program)
    }
}

/// Lazily reads a stream of JSON command specs.
///
/// Values may be separated by any whitespace, so both JSON lines and
/// concatenated objects are accepted.
pub fn read_specs<R: Read>(reader: R) -> impl Iterator<Item = Result<CommandSpec>> {
    Deserializer::from_reader(reader)
        .into_iter::<CommandSpec>()
        .map(|spec| spec.map_err(Into::into))
}

/// Counts the outcomes of command jobs. Shared between jobs via `Arc`.
#[derive(Debug, Default)]
pub struct Tally {
    succeeded: AtomicUsize,
    failed: AtomicUsize,
}

impl Tally {
    /// Number of commands that exited successfully.
    pub fn succeeded(&self) -> usize {
        self.succeeded.load(Ordering::SeqCst)
    }

    /// Number of commands that failed to start or exited unsuccessfully.
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }
}

/// A job that runs an external command to completion.
///
/// The command's stdout is captured and written to this process's stdout
/// in one piece, so output of concurrent jobs never interleaves.
pub struct CommandJob {
    spec: CommandSpec,
    tally: Arc<Tally>,
}

impl CommandJob {
    /// Creates a job recording its outcome in `tally`.
    pub fn new(spec: CommandSpec, tally: Arc<Tally>) -> Self {
        CommandJob { spec, tally }
    }

    fn execute(&self) -> io::Result<bool> {
        let output = Command::new(&self.spec.program)
            .args(&self.spec.args)
            .output()?;

        let mut stdout = io::stdout().lock();
        stdout.write_all(&output.stdout)?;
        stdout.flush()?;

        if !output.status.success() {
            error!(
                "Command '{}' failed with {}: {}",
                self.spec.label(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim_end()
            );
        }
        Ok(output.status.success())
    }
}

impl Job for CommandJob {
    fn run(self: Box<Self>) {
        debug!("Running command '{}'", self.spec.label());
        let succeeded = match self.execute() {
            Ok(succeeded) => succeeded,
            Err(e) => {
                error!("Command '{}' could not run: {}", self.spec.label(), e);
                false
            }
        };

        if succeeded {
            self.tally.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.tally.failed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
