use std::ops::Range;

use lisle_buffer::BufferSnapshot;
use lisle_lexer::TokenKind;

use crate::{Error, Result};

/// A buffer line as seen through the token stream.
#[derive(Debug, Clone)]
pub(crate) struct Line {
	/// Byte range without the line terminator.
	pub range: Range<usize>,
	/// First token starting on this line that is not whitespace.
	pub leading: Option<usize>,
	/// Multi-line literal that the line starts inside of.
	pub literal: Option<usize>,
}

impl Line {
	pub fn is_blank(&self) -> bool {
		self.literal.is_none() && self.leading.is_none()
	}
}

pub(crate) fn line(snapshot: &BufferSnapshot, index: usize) -> Result<Line> {
	let range = snapshot.line_range(index).ok_or(Error::LineOutOfRange {
		line: index,
		lines: snapshot.len_lines(),
	})?;
	let tokens = snapshot.tokens();

	let Some(mut idx) = snapshot.token_index_at(range.start) else {
		return Ok(Line {
			range,
			leading: None,
			literal: None,
		});
	};

	let first = &tokens[idx];
	if first.start < range.start && first.kind.is_multiline_literal() {
		return Ok(Line {
			range,
			leading: None,
			literal: Some(idx),
		});
	}

	while tokens.get(idx).is_some_and(|t| t.kind == TokenKind::Whitespace) {
		idx += 1;
	}
	let leading = tokens
		.get(idx)
		.is_some_and(|t| t.start < range.end)
		.then_some(idx);
	Ok(Line {
		range,
		leading,
		literal: None,
	})
}

/// Lines touched by a selection. A selection ending at column 0 of a later line
/// does not include that line.
pub(crate) fn selected_lines(snapshot: &BufferSnapshot, selection: Range<usize>) -> Result<Range<usize>> {
	let len = snapshot.len_bytes();
	if selection.start > selection.end || selection.end > len {
		return Err(Error::RangeOutOfBounds {
			start: selection.start,
			end: selection.end,
			len,
		});
	}

	let first = snapshot.line_of(selection.start);
	let mut last = snapshot.line_of(selection.end);
	if last > first && snapshot.line_start(last) == Some(selection.end) {
		last -= 1;
	}
	Ok(first..last + 1)
}

/// Width of the run of spaces and tabs at the start of `range`.
pub(crate) fn leading_whitespace(snapshot: &BufferSnapshot, range: &Range<usize>) -> usize {
	snapshot
		.text
		.byte_slice(range.clone())
		.chars()
		.take_while(|c| matches!(c, ' ' | '\t'))
		.count()
}
