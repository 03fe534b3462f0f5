use std::ops::Range;

use crate::{BufferId, ChangeSet, Result};

/// Replacement of a byte range with new text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
	/// Byte range of the source text being replaced.
	pub range: Range<usize>,
	/// Replacement text; empty for a pure deletion.
	pub text: String,
}

impl TextEdit {
	/// Insert `text` at `offset`.
	pub fn insert(offset: usize, text: impl Into<String>) -> Self {
		Self {
			range: offset..offset,
			text: text.into(),
		}
	}

	/// Delete `range`.
	pub fn delete(range: Range<usize>) -> Self {
		Self {
			range,
			text: String::new(),
		}
	}

	/// Replace `range` with `text`.
	pub fn replace(range: Range<usize>, text: impl Into<String>) -> Self {
		Self { range, text: text.into() }
	}
}

/// A set of edits computed against a specific buffer version.
///
/// Structural commands never mutate buffers. They return a plan and the host
/// applies it; `base_version` lets the host detect plans that went stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPlan {
	/// Buffer the plan targets.
	pub buffer: BufferId,
	/// Buffer version the offsets refer to.
	pub base_version: u64,
	/// Non-overlapping edits ordered by start offset.
	pub edits: Vec<TextEdit>,
}

impl EditPlan {
	/// Creates an empty plan.
	pub fn new(buffer: BufferId, base_version: u64) -> Self {
		Self {
			buffer,
			base_version,
			edits: Vec::new(),
		}
	}

	/// Appends an edit. Callers push edits in ascending offset order.
	pub fn push(&mut self, edit: TextEdit) {
		self.edits.push(edit);
	}

	/// Returns true if applying the plan changes nothing.
	pub fn is_empty(&self) -> bool {
		self.edits.iter().all(|e| e.range.is_empty() && e.text.is_empty())
	}

	/// Converts the plan into a change set against a document of `len` bytes.
	pub fn to_change_set(&self, len: usize) -> Result<ChangeSet> {
		ChangeSet::from_edits(len, self.edits.iter().cloned())
	}
}
