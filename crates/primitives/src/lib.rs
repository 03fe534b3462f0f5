//! Core types shared by the lisle crates: buffer identities, byte-offset change
//! sets, edit plans, and the read-only project configuration accessor.

/// Byte-offset change sets describing buffer edits.
pub mod change;
/// Project configuration lookup.
pub mod config;
/// Edit plans produced by structural commands.
pub mod edit;
/// Identifier types for tracked buffers.
pub mod ids;

pub use change::{ChangeSet, EditWindow, Operation};
pub use config::{ProjectConfig, ProjectFile, StaticConfig};
pub use edit::{EditPlan, TextEdit};
pub use ids::BufferId;
pub use ropey::{Rope, RopeSlice};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while building or applying edits, or reading configuration.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The change set was built against a document of a different length.
	#[error("change set expects {expected} bytes but the document has {actual}")]
	ChangeSetMismatch {
		/// Source length recorded in the change set.
		expected: usize,
		/// Length of the document it was applied to.
		actual: usize,
	},
	/// An edit points past the end of the document or inside a UTF-8 sequence.
	#[error("edit at byte {offset} is out of bounds or not on a char boundary")]
	EditOutOfBounds {
		/// Offending byte offset.
		offset: usize,
	},
	/// Two edits of a plan cover the same bytes.
	#[error("edits overlap at byte {offset}")]
	OverlappingEdits {
		/// Start of the second, overlapping edit.
		offset: usize,
	},
	/// The project file could not be read or parsed.
	#[error("project configuration: {0}")]
	Config(String),
}
