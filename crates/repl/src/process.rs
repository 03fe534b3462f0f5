//! Process spawning seam.

use std::fmt;
use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tracing::debug;

use crate::LaunchParameters;

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
	/// Exited with a status code.
	Code(i32),
	/// Killed by a signal.
	Signal,
}

impl ProcessExit {
	/// True for exit code 0.
	pub fn success(self) -> bool {
		self == Self::Code(0)
	}
}

impl fmt::Display for ProcessExit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Code(code) => write!(f, "exit code {code}"),
			Self::Signal => f.write_str("killed by signal"),
		}
	}
}

/// Lifetime control over a spawned process.
#[async_trait]
pub trait ProcessControl: Send {
	/// Waits for the process to exit. Must be cancel safe.
	async fn wait(&mut self) -> io::Result<ProcessExit>;

	/// Forcibly terminates the process.
	async fn kill(&mut self) -> io::Result<()>;

	/// OS process id, when there is one.
	fn id(&self) -> Option<u32> {
		None
	}
}

/// Pipes and control handle of a freshly spawned process.
pub struct SpawnedProcess {
	/// Interpreter standard input.
	pub stdin: Box<dyn AsyncWrite + Send + Unpin>,
	/// Interpreter standard output.
	pub stdout: Box<dyn AsyncRead + Send + Unpin>,
	/// Interpreter standard error.
	pub stderr: Box<dyn AsyncRead + Send + Unpin>,
	/// Wait and kill.
	pub control: Box<dyn ProcessControl>,
}

impl fmt::Debug for SpawnedProcess {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SpawnedProcess")
			.field("pid", &self.control.id())
			.finish_non_exhaustive()
	}
}

/// Starts interpreter processes.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
	/// Spawns a process with all three standard streams piped.
	async fn spawn(&self, params: &LaunchParameters) -> io::Result<SpawnedProcess>;
}

/// Spawns real OS processes through `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSpawner;

#[async_trait]
impl ProcessSpawner for TokioSpawner {
	async fn spawn(&self, params: &LaunchParameters) -> io::Result<SpawnedProcess> {
		let mut cmd = Command::new(&params.interpreter);
		cmd.args(&params.args)
			.current_dir(&params.working_dir)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		for (key, value) in &params.env {
			cmd.env(key, value);
		}

		let mut child = cmd.spawn()?;
		debug!(program = %params.program(), pid = ?child.id(), "repl.process_spawned");

		let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
		let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
		let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

		Ok(SpawnedProcess {
			stdin: Box::new(stdin),
			stdout: Box::new(stdout),
			stderr: Box::new(stderr),
			control: Box::new(ChildControl(child)),
		})
	}
}

fn missing_pipe(name: &str) -> io::Error {
	io::Error::other(format!("failed to capture {name}"))
}

struct ChildControl(Child);

#[async_trait]
impl ProcessControl for ChildControl {
	async fn wait(&mut self) -> io::Result<ProcessExit> {
		let status = self.0.wait().await?;
		Ok(match status.code() {
			Some(code) => ProcessExit::Code(code),
			None => ProcessExit::Signal,
		})
	}

	async fn kill(&mut self) -> io::Result<()> {
		self.0.kill().await
	}

	fn id(&self) -> Option<u32> {
		self.0.id()
	}
}
