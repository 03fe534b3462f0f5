//! REPL process management.
//!
//! Launching is split in two: [`LaunchParameters::resolve`] is a pure read of
//! project configuration, and [`ReplSession::start`] performs the effectful
//! spawn through a [`ProcessSpawner`], so sessions can be driven by a fake
//! process in tests.
//!
//! A session walks the [`SessionState`] machine:
//!
//! ```text
//! NotStarted -> Starting -> Ready <-> Busy
//!                  |          |        |
//!                  +----------+--------+--> Faulted | Terminated
//! ```
//!
//! Submissions are strictly one at a time; a second [`ReplSession::submit`]
//! while busy fails with [`Error::SessionBusy`]. Completion is detected by the
//! interpreter printing its prompt, as configured by [`ReplProtocol`].

mod factory;
mod launch;
pub mod operations;
mod process;
mod protocol;
mod session;

use std::io;
use std::time::Duration;

pub use factory::{ReplFactory, ReplView};
pub use launch::{INTERPRETER_ENV, LaunchParameters};
pub use process::{ProcessControl, ProcessExit, ProcessSpawner, SpawnedProcess, TokioSpawner};
pub use protocol::{DEFAULT_PROMPT, Framed, ReplProtocol};
pub use session::{
	Evaluation, ExitReason, OutputStream, ReplOutput, ReplSession, SessionId, SessionState, SubmissionId,
};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// REPL errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// Launch parameters could not be resolved from the project.
	#[error("configuration error: {0}")]
	Configuration(String),
	/// The interpreter could not be spawned, or died before becoming ready.
	#[error("failed to launch {program}: {source}")]
	Launch {
		/// Interpreter that was launched.
		program: String,
		/// Underlying OS or process error.
		#[source]
		source: io::Error,
	},
	/// `start` was called on a session that already left `NotStarted`.
	#[error("session was already started")]
	AlreadyStarted,
	/// A submission is still in flight.
	#[error("session is busy evaluating a previous submission")]
	SessionBusy,
	/// The session has been stopped or its process is gone.
	#[error("session has terminated")]
	SessionTerminated,
	/// The session cannot accept submissions yet.
	#[error("session is not ready ({0})")]
	SessionNotReady(SessionState),
	/// The submission holds no forms.
	#[error("submission contains no forms")]
	EmptySubmission,
	/// The submission ends inside an unclosed form or an unterminated literal,
	/// so the interpreter would wait for more input.
	#[error("submission is not a complete set of forms")]
	IncompleteSubmission,
	/// The submission has a closing delimiter with nothing to close. More input
	/// cannot fix it.
	#[error("unmatched closing delimiter at byte {offset}")]
	UnbalancedSubmission {
		/// Byte offset of the delimiter.
		offset: usize,
	},
	/// A wait ran past its deadline.
	#[error("timed out after {after:?} waiting for {operation}")]
	Timeout {
		/// What was being waited for.
		operation: &'static str,
		/// Deadline that passed.
		after: Duration,
	},
	/// The output stream of a session can only be taken once.
	#[error("session output was already taken")]
	OutputTaken,
	/// Pipe I/O failed.
	#[error(transparent)]
	Io(#[from] io::Error),
}
