use std::ops::Range;

use crate::edit::TextEdit;
use crate::{Error, Result, Rope, RopeSlice};

#[cfg(test)]
mod tests;

/// A single retain/delete/insert step of a [`ChangeSet`]. Lengths are in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
	/// Keep the next N bytes of the source.
	Retain(usize),
	/// Drop the next N bytes of the source.
	Delete(usize),
	/// Insert text at the current position.
	Insert(String),
}

/// The smallest span of a document touched by a change set.
///
/// `start` is the same in both coordinate spaces. `old_end` is measured in the
/// source document and `new_end` in the document after the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditWindow {
	/// First byte that differs.
	pub start: usize,
	/// End of the replaced span in the source document.
	pub old_end: usize,
	/// End of the replacement in the changed document.
	pub new_end: usize,
}

impl EditWindow {
	/// Signed length difference introduced by the change.
	pub fn delta(&self) -> isize {
		self.new_end as isize - self.old_end as isize
	}
}

/// A sequence of operations describing one edit notification for a buffer.
///
/// Offsets are UTF-8 byte offsets. A change set records the length of the
/// document it was built against, and refuses to apply to anything else.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSet {
	changes: Vec<Operation>,
	len: usize,
	len_after: usize,
}

impl ChangeSet {
	/// Creates an empty change set for an empty document.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a change set from non-overlapping edits against a document of `len` bytes.
	///
	/// Edits may arrive in any order; they are sorted by start offset. Edits that
	/// share a start offset keep their relative order.
	pub fn from_edits(len: usize, edits: impl IntoIterator<Item = TextEdit>) -> Result<Self> {
		let mut edits: Vec<TextEdit> = edits.into_iter().collect();
		edits.sort_by_key(|edit| edit.range.start);

		let mut cs = Self::new();
		let mut pos = 0;
		for edit in edits {
			let Range { start, end } = edit.range;
			if start < pos {
				return Err(Error::OverlappingEdits { offset: start });
			}
			if end > len || start > end {
				return Err(Error::EditOutOfBounds { offset: end });
			}
			cs.retain(start - pos);
			cs.delete(end - start);
			cs.insert(edit.text);
			pos = end;
		}
		cs.retain(len - pos);
		Ok(cs)
	}

	/// Shorthand for a single replacement of `range` by `text`.
	pub fn replace(len: usize, range: Range<usize>, text: impl Into<String>) -> Result<Self> {
		Self::from_edits(len, [TextEdit::replace(range, text)])
	}

	/// Returns the length of the source document (before changes).
	pub fn len(&self) -> usize {
		self.len
	}

	/// Returns the length of the document after applying changes.
	pub fn len_after(&self) -> usize {
		self.len_after
	}

	/// Returns true if this change set contains no operations.
	pub fn is_empty(&self) -> bool {
		self.changes.is_empty()
	}

	/// Returns true if applying this change set leaves the document untouched.
	pub fn is_identity(&self) -> bool {
		self.changes.iter().all(|op| matches!(op, Operation::Retain(_)))
	}

	/// Returns a slice of all operations in this change set.
	pub fn changes(&self) -> &[Operation] {
		&self.changes
	}

	/// Adds a retain operation. Consecutive retains are merged.
	pub fn retain(&mut self, n: usize) {
		if n == 0 {
			return;
		}

		self.len += n;
		self.len_after += n;

		if let Some(Operation::Retain(count)) = self.changes.last_mut() {
			*count += n;
		} else {
			self.changes.push(Operation::Retain(n));
		}
	}

	/// Adds a delete operation. Consecutive deletes are merged.
	pub fn delete(&mut self, n: usize) {
		if n == 0 {
			return;
		}

		self.len += n;

		if let Some(Operation::Delete(count)) = self.changes.last_mut() {
			*count += n;
		} else {
			self.changes.push(Operation::Delete(n));
		}
	}

	/// Adds an insert operation.
	///
	/// Inserts are merged with adjacent inserts, and an insert that follows a
	/// delete is moved in front of it so that the sequence stays canonical.
	pub fn insert(&mut self, text: impl Into<String>) {
		let text = text.into();
		if text.is_empty() {
			return;
		}

		self.len_after += text.len();

		match self.changes.as_mut_slice() {
			[.., Operation::Insert(prev)] | [.., Operation::Insert(prev), Operation::Delete(_)] => {
				prev.push_str(&text);
			}
			[.., last @ Operation::Delete(_)] => {
				let del = std::mem::replace(last, Operation::Insert(text));
				self.changes.push(del);
			}
			_ => {
				self.changes.push(Operation::Insert(text));
			}
		}
	}

	/// Checks that every boundary of this change set falls on a char boundary of `doc`.
	pub fn validate(&self, doc: RopeSlice<'_>) -> Result<()> {
		if doc.len_bytes() != self.len {
			return Err(Error::ChangeSetMismatch {
				expected: self.len,
				actual: doc.len_bytes(),
			});
		}

		let mut pos = 0;
		for op in &self.changes {
			match op {
				Operation::Retain(n) | Operation::Delete(n) => {
					byte_to_char(doc, pos)?;
					pos += n;
					byte_to_char(doc, pos)?;
				}
				Operation::Insert(_) => {
					byte_to_char(doc, pos)?;
				}
			}
		}
		Ok(())
	}

	/// Applies this change set to a document in place.
	///
	/// The document is left untouched when validation fails.
	pub fn apply(&self, doc: &mut Rope) -> Result<()> {
		self.validate(doc.slice(..))?;

		let mut pos = 0;
		for op in &self.changes {
			match op {
				Operation::Retain(n) => {
					pos += n;
				}
				Operation::Delete(n) => {
					let start = doc.byte_to_char(pos);
					let end = doc.byte_to_char(pos + n);
					doc.remove(start..end);
				}
				Operation::Insert(text) => {
					doc.insert(doc.byte_to_char(pos), text);
					pos += text.len();
				}
			}
		}
		Ok(())
	}

	/// Applies this change set to a string slice, returning the new text.
	pub fn apply_str(&self, text: &str) -> Result<String> {
		if text.len() != self.len {
			return Err(Error::ChangeSetMismatch {
				expected: self.len,
				actual: text.len(),
			});
		}

		let mut out = String::with_capacity(self.len_after);
		let mut pos = 0;
		for op in &self.changes {
			match op {
				Operation::Retain(n) => {
					out.push_str(slice(text, pos, pos + n)?);
					pos += n;
				}
				Operation::Delete(n) => {
					slice(text, pos, pos + n)?;
					pos += n;
				}
				Operation::Insert(ins) => out.push_str(ins),
			}
		}
		Ok(out)
	}

	/// Returns the span touched by this change set, or `None` for an identity change.
	pub fn window(&self) -> Option<EditWindow> {
		let mut old_pos = 0;
		let mut new_pos = 0;
		let mut window: Option<EditWindow> = None;

		for op in &self.changes {
			match op {
				Operation::Retain(n) => {
					old_pos += n;
					new_pos += n;
					continue;
				}
				Operation::Delete(n) => old_pos += n,
				Operation::Insert(text) => new_pos += text.len(),
			}

			let start = window.map_or(old_pos.min(new_pos), |w| w.start);
			window = Some(EditWindow {
				start,
				old_end: old_pos,
				new_end: new_pos,
			});
		}

		window
	}
}

fn byte_to_char(doc: RopeSlice<'_>, byte: usize) -> Result<usize> {
	if byte > doc.len_bytes() {
		return Err(Error::EditOutOfBounds { offset: byte });
	}
	let ch = doc.byte_to_char(byte);
	if doc.char_to_byte(ch) != byte {
		return Err(Error::EditOutOfBounds { offset: byte });
	}
	Ok(ch)
}

fn slice(text: &str, start: usize, end: usize) -> Result<&str> {
	text.get(start..end).ok_or(Error::EditOutOfBounds { offset: end })
}
