//! Structural editing commands driven by a buffer's token stream.
//!
//! Every command reads a [`BufferSnapshot`] and returns an [`EditPlan`]
//! stamped with the snapshot's version. Nothing here mutates a buffer: the
//! host applies the plan and reports the edit back like any other.
//!
//! [`BufferSnapshot`]: lisle_buffer::BufferSnapshot
//! [`EditPlan`]: lisle_primitives::EditPlan

mod comment;
mod forms;
mod indent;
mod lines;


pub use comment::{comment, is_commented, uncomment};
pub use forms::{current_form, namespace_of};
pub use indent::{IndentOptions, compute_indent, format_document, target_indent};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by editing commands.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The requested line does not exist.
	#[error("line {line} is out of range; buffer has {lines} lines")]
	LineOutOfRange {
		/// Requested zero-based line.
		line: usize,
		/// Number of lines in the buffer.
		lines: usize,
	},
	/// The selection is inverted or extends past the end of the buffer.
	#[error("range {start}..{end} is out of bounds for {len} bytes")]
	RangeOutOfBounds {
		/// Selection start.
		start: usize,
		/// Selection end.
		end: usize,
		/// Buffer length in bytes.
		len: usize,
	},
	/// An editor option holds a value of the wrong shape.
	#[error("invalid value {value:?} for {key}")]
	InvalidOption {
		/// Dotted configuration key.
		key: &'static str,
		/// Value as found in the configuration.
		value: String,
	},
}
