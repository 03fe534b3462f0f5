use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lisle_lexer::{Token, relex, tokenize_rope};
use lisle_primitives::{BufferId, ChangeSet, EditWindow, Rope, RopeSlice};
use tracing::trace;

use crate::Result;

/// One buffer's text together with the tokens of exactly that text.
#[derive(Debug)]
pub struct TokenizedBuffer {
	id: BufferId,
	path: Option<PathBuf>,
	text: Rope,
	tokens: Arc<Vec<Token>>,
	version: u64,
	/// Set once the registry has dropped this buffer; later edits are refused.
	disposed: bool,
}

impl TokenizedBuffer {
	/// Tokenizes `text` in full and starts at version 0.
	pub fn new(id: BufferId, path: Option<PathBuf>, text: &str) -> Self {
		let text = Rope::from(text);
		let tokens = Arc::new(tokenize_rope(text.slice(..)));
		Self {
			id,
			path,
			text,
			tokens,
			version: 0,
			disposed: false,
		}
	}

	/// Buffer identity.
	pub fn id(&self) -> BufferId {
		self.id
	}

	/// Path last reported by the host, if any.
	pub fn path(&self) -> Option<&Path> {
		self.path.as_deref()
	}

	/// Number of edits applied since creation.
	pub fn version(&self) -> u64 {
		self.version
	}

	/// Current tokens.
	pub fn tokens(&self) -> &[Token] {
		&self.tokens
	}

	/// Current text.
	pub fn text(&self) -> RopeSlice<'_> {
		self.text.slice(..)
	}

	/// Applies an edit and re-tokenizes the touched region.
	///
	/// Returns the changed byte range in the new text, or `None` when the change
	/// set was an identity. The version advances either way, since the host saw
	/// an edit notification.
	pub fn apply(&mut self, changes: &ChangeSet) -> Result<Option<Range<usize>>> {
		changes.apply(&mut self.text)?;
		self.version += 1;

		let Some(window) = changes.window() else {
			return Ok(None);
		};
		self.tokens = Arc::new(relex(&self.tokens, self.text.slice(..), window));
		trace!(
			buffer_id = %self.id,
			version = self.version,
			start = window.start,
			tokens = self.tokens.len(),
			"buffer.relexed"
		);
		Ok(Some(changed_range(window)))
	}

	pub(crate) fn set_path(&mut self, path: PathBuf) {
		self.path = Some(path);
	}

	pub(crate) fn is_disposed(&self) -> bool {
		self.disposed
	}

	pub(crate) fn dispose(&mut self) {
		self.disposed = true;
	}

	/// Read-only view of the current state.
	pub fn snapshot(&self) -> BufferSnapshot {
		BufferSnapshot {
			id: self.id,
			version: self.version,
			text: self.text.clone(),
			tokens: Arc::clone(&self.tokens),
		}
	}
}

fn changed_range(window: EditWindow) -> Range<usize> {
	window.start..window.new_end
}

/// Immutable copy of a buffer at one version.
///
/// Cheap to take: the rope shares structure with the live buffer and the token
/// vector is reference counted.
#[derive(Debug, Clone)]
pub struct BufferSnapshot {
	/// Buffer identity.
	pub id: BufferId,
	/// Version the text and tokens belong to.
	pub version: u64,
	/// Buffer text.
	pub text: Rope,
	/// Tokens of `text`.
	pub tokens: Arc<Vec<Token>>,
}

impl BufferSnapshot {
	/// Tokens of the snapshot text.
	pub fn tokens(&self) -> &[Token] {
		&self.tokens
	}

	/// Length of the text in bytes.
	pub fn len_bytes(&self) -> usize {
		self.text.len_bytes()
	}

	/// Number of lines. A trailing newline starts an empty last line.
	pub fn len_lines(&self) -> usize {
		self.text.len_lines()
	}

	/// Byte offset where `line` starts, or `None` past the last line.
	pub fn line_start(&self, line: usize) -> Option<usize> {
		(line < self.text.len_lines()).then(|| self.text.line_to_byte(line))
	}

	/// Byte range of `line` without its line terminator.
	pub fn line_range(&self, line: usize) -> Option<Range<usize>> {
		let start = self.line_start(line)?;
		let content = self.text.line(line);
		let mut len = content.len_bytes();
		let mut chars = content.chars_at(content.len_chars());
		for _ in 0..2 {
			match chars.prev() {
				Some('\n') | Some('\r') if len > 0 => len -= 1,
				_ => break,
			}
		}
		Some(start..start + len)
	}

	/// Line containing byte `offset`; offsets past the end clamp to the last line.
	pub fn line_of(&self, offset: usize) -> usize {
		self.text.byte_to_line(offset.min(self.text.len_bytes()))
	}

	/// Index of the token covering byte `offset`.
	pub fn token_index_at(&self, offset: usize) -> Option<usize> {
		let idx = self.tokens.partition_point(|t| t.end() <= offset);
		(idx < self.tokens.len()).then_some(idx)
	}

	/// Text of `range` as an owned string.
	pub fn slice_to_string(&self, range: Range<usize>) -> String {
		self.text.byte_slice(range).to_string()
	}
}

#[cfg(test)]
mod tests {
	use lisle_lexer::tokenize;
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn test_apply_relexes_and_bumps_version() {
		let mut buffer = TokenizedBuffer::new(BufferId(1), None, "(a b)");
		let changes = ChangeSet::replace(5, 3..4, "bee").expect("valid");

		let changed = buffer.apply(&changes).expect("apply");

		assert_eq!(changed, Some(3..6));
		assert_eq!(buffer.version(), 1);
		assert_eq!(buffer.text().to_string(), "(a bee)");
		assert_eq!(buffer.tokens(), tokenize("(a bee)").as_slice());
	}

	#[test]
	fn test_rejected_edit_leaves_buffer_untouched() {
		let mut buffer = TokenizedBuffer::new(BufferId(1), None, "(a)");
		let changes = ChangeSet::replace(10, 0..1, "x").expect("valid");

		assert!(buffer.apply(&changes).is_err());
		assert_eq!(buffer.version(), 0);
		assert_eq!(buffer.text().to_string(), "(a)");
	}

	#[test]
	fn test_snapshot_is_detached_from_later_edits() {
		let mut buffer = TokenizedBuffer::new(BufferId(1), None, "(a)");
		let before = buffer.snapshot();
		buffer
			.apply(&ChangeSet::replace(3, 3..3, " (b)").expect("valid"))
			.expect("apply");

		assert_eq!(before.version, 0);
		assert_eq!(before.text.to_string(), "(a)");
		assert_eq!(before.tokens().len(), 3);
		assert_eq!(buffer.snapshot().version, 1);
	}

	#[test]
	fn test_line_helpers() {
		let snapshot = TokenizedBuffer::new(BufferId(1), None, "(a\r\n  b)\n").snapshot();
		assert_eq!(snapshot.len_lines(), 3);
		assert_eq!(snapshot.line_range(0), Some(0..2));
		assert_eq!(snapshot.line_range(1), Some(4..8));
		assert_eq!(snapshot.line_range(2), Some(9..9));
		assert_eq!(snapshot.line_range(3), None);
		assert_eq!(snapshot.line_of(5), 1);
		assert_eq!(snapshot.line_of(100), 2);
		assert_eq!(snapshot.token_index_at(0), Some(0));
		assert_eq!(snapshot.token_index_at(9), None);
	}
}
