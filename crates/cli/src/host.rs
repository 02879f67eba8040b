//! [`ActionHost`] that speaks GitHub Actions workflow commands.
//!
//! Messages go to the wrapped writer (stdout in production) as
//! `::warning::`/`::group::` commands. Step outputs are appended to the file
//! named by `$GITHUB_OUTPUT` in the multi-line heredoc form; without that
//! file they are only echoed to the log.

use std::fs::OpenOptions;
use std::io::{self, Stdout, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};
use uuid::Uuid;

use dispatch::{ActionHost, DispatchError, OutputName};

pub struct GithubActionsHost<W: Write + Send> {
    out: Mutex<W>,
    output_file: Option<PathBuf>,
}

impl GithubActionsHost<Stdout> {
    pub fn stdout(output_file: Option<PathBuf>) -> Self {
        Self::new(io::stdout(), output_file)
    }
}

impl<W: Write + Send> GithubActionsHost<W> {
    pub fn new(out: W, output_file: Option<PathBuf>) -> Self {
        Self {
            out: Mutex::new(out),
            output_file,
        }
    }

    /// Error annotation. Used once, for the message that fails the step.
    pub fn error(&self, message: &str) {
        self.command("error", message);
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn line(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = writeln!(out, "{text}").and_then(|()| out.flush()) {
            warn!(error = %e, "failed to write to the job log");
        }
    }

    fn command(&self, name: &str, message: &str) {
        self.line(&format!("::{name}::{}", escape_data(message)));
    }

    fn append_output(&self, path: &Path, name: OutputName, value: &str) -> io::Result<()> {
        let delimiter = format!("ghadelimiter_{}", Uuid::new_v4());
        if value.contains(&delimiter) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "value contains the heredoc delimiter",
            ));
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        write!(file, "{name}<<{delimiter}\n{value}\n{delimiter}\n")?;
        file.flush()
    }
}

impl<W: Write + Send> ActionHost for GithubActionsHost<W> {
    fn info(&self, message: &str) {
        self.line(message);
    }

    fn warning(&self, message: &str) {
        self.command("warning", message);
    }

    fn start_group(&self, title: &str) {
        self.command("group", title);
    }

    fn end_group(&self) {
        self.line("::endgroup::");
    }

    fn set_output(&self, name: OutputName, value: &str) -> Result<(), DispatchError> {
        match &self.output_file {
            Some(path) => {
                debug!(output = %name, path = %path.display(), "writing step output");
                self.append_output(path, name, value)
                    .map_err(|e| DispatchError::Output {
                        name: name.as_str(),
                        message: e.to_string(),
                    })
            }
            None => {
                self.line(&format!("{name}: {value}"));
                Ok(())
            }
        }
    }
}

/// Escapes the message part of a workflow command so it stays on one line.
fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}
