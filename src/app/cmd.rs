//! Child-process execution with live output streaming.
//!
//! Every operation in this crate is an invocation of a vendor CLI (`aws`,
//! `kubectl`). [`Cmd`] spawns the child with piped stdio, relays both streams
//! line by line while the child runs, and collects them so a failure can
//! report the child's stderr and exit status unchanged.

use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::info;

#[derive(Error, Debug)]
pub enum CmdError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("failed to read output of `{program}`: {source}")]
    Read {
        program: String,
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
}

impl CmdError {
    /// Exit code to propagate to our own caller, so that `sesh` fails the
    /// same way the underlying tool did. A child killed by a signal carries
    /// no code; that maps to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            CmdError::Failed { status, .. } => status.code().unwrap_or(1),
            _ => 1,
        }
    }
}

pub struct Cmd {
    program: String,
    args: Vec<String>,
    echo_stdout: bool,
}

impl Cmd {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            program: program.to_string(),
            args: args
                .into_iter()
                .map(|arg| arg.as_ref().to_string())
                .collect(),
            echo_stdout: true,
        }
    }

    /// Keep the child's stdout off our own stdout. Used when stdout is the
    /// command's result (the db auth token) rather than progress output.
    pub fn quiet(mut self) -> Self {
        self.echo_stdout = false;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The rendered command line, exactly as it will be invoked.
    pub fn line(&self) -> String {
        format!("{} {}", self.program, self.args.join(" "))
    }

    pub async fn run(self) -> Result<CmdOutput, CmdError> {
        self.run_with(|_| {}).await
    }

    /// Run the child to completion, calling `on_stdout` for every stdout
    /// line as it arrives. Lines are relayed to the operator at the same
    /// time: stdout to our stdout (unless [`quiet`](Self::quiet)), stderr to
    /// our stderr.
    pub async fn run_with(
        self,
        mut on_stdout: impl FnMut(&str),
    ) -> Result<CmdOutput, CmdError> {
        info!("$ {}", self.line());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // If our future is dropped (tunnel interrupted), the child must
            // not outlive us.
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CmdError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdout_lines =
            BufReader::new(child.stdout.take().expect("stdout is piped")).lines();
        let mut stderr_lines =
            BufReader::new(child.stderr.take().expect("stderr is piped")).lines();

        let mut stdout = String::new();
        let mut stderr = String::new();
        let mut stdout_open = true;
        let mut stderr_open = true;

        let read_err = |source| CmdError::Read {
            program: self.program.clone(),
            source,
        };

        while stdout_open || stderr_open {
            tokio::select! {
                line = stdout_lines.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => {
                        on_stdout(&line);
                        if self.echo_stdout {
                            println!("{line}");
                        }
                        stdout.push_str(&line);
                        stdout.push('\n');
                    }
                    Ok(None) => stdout_open = false,
                    Err(source) => return Err(read_err(source)),
                },
                line = stderr_lines.next_line(), if stderr_open => match line {
                    Ok(Some(line)) => {
                        eprintln!("{line}");
                        stderr.push_str(&line);
                        stderr.push('\n');
                    }
                    Ok(None) => stderr_open = false,
                    Err(source) => return Err(read_err(source)),
                },
            }
        }

        let status = child.wait().await.map_err(read_err)?;

        Ok(CmdOutput {
            program: self.program,
            status,
            stdout,
            stderr,
        })
    }
}

#[derive(Debug)]
pub struct CmdOutput {
    program: String,
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

impl CmdOutput {
    pub fn status(&self) -> ExitStatus {
        self.status
    }

    pub fn stdout(&self) -> &str {
        self.stdout.trim()
    }

    pub fn stderr(&self) -> &str {
        self.stderr.trim()
    }

    /// Convert a non-zero exit into [`CmdError::Failed`], carrying the exit
    /// status and collected stderr verbatim.
    pub fn ensure_success(self) -> Result<Self, CmdError> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(CmdError::Failed {
                program: self.program,
                status: self.status,
                stderr: self.stderr,
            })
        }
    }
}
