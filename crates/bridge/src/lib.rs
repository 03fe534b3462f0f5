//! The surface an editor host drives.
//!
//! The host forwards document lifecycle and edit notifications through
//! [`DocumentEvents`], asks for tokens and edit plans, and starts and feeds REPL
//! sessions. Edit plans are pure: the host applies them to its own buffer and
//! reports the result back as an ordinary edit.

mod bridge;
mod language;

use lisle_primitives::BufferId;
use lisle_repl::SessionId;

pub use bridge::EditorBridge;
pub use language::{TRACKED_EXTENSIONS, is_tracked_language};
pub use lisle_buffer::{BufferEvent, BufferEventReceiver, BufferSnapshot, DocumentEvents};
pub use lisle_editing::IndentOptions;
pub use lisle_repl::{
	LaunchParameters, OutputStream, ProcessSpawner, ReplOutput, ReplProtocol, ReplView, SessionState, SubmissionId,
	TokioSpawner,
};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced to the editor host.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// Buffer tracking failed.
	#[error(transparent)]
	Buffer(#[from] lisle_buffer::Error),
	/// An editing command was given bad input.
	#[error(transparent)]
	Editing(#[from] lisle_editing::Error),
	/// A REPL operation failed.
	#[error(transparent)]
	Repl(#[from] lisle_repl::Error),
	/// No session with this handle was started through the bridge.
	#[error("no session {0}")]
	UnknownSession(SessionId),
	/// There is no form at or before the cursor.
	#[error("no form at byte {offset} of {buffer}")]
	NoFormAtCursor {
		/// Buffer searched.
		buffer: BufferId,
		/// Cursor offset.
		offset: usize,
	},
	/// The buffer has no file on disk to load.
	#[error("{0} has no path")]
	NoPath(BufferId),
	/// The buffer declares no namespace.
	#[error("{0} has no ns form")]
	NoNamespace(BufferId),
}
