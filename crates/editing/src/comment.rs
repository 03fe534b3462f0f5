//! Line-comment toggling.
//!
//! Commenting prefixes `;` at column 0 of every eligible non-blank line in the
//! selection, and is a no-op when all of them already start with a `;`
//! comment. Uncommenting removes the first `;` of each such line. Together they
//! restore the original text byte for byte.
//!
//! A line that starts inside a multi-line string or regex is only eligible when
//! the line that opens that literal is commented too; otherwise the edit would
//! change the literal's contents rather than comment anything out.

use std::ops::Range;

use lisle_buffer::BufferSnapshot;
use lisle_lexer::TokenKind;
use lisle_primitives::{EditPlan, TextEdit};
use tracing::debug;

use crate::Result;
use crate::lines::{Line, line, selected_lines};

const MARKER: &str = ";";

/// Returns true if the line's first non-whitespace token is a `;` comment.
pub fn is_commented(snapshot: &BufferSnapshot, index: usize) -> Result<bool> {
	let line = line(snapshot, index)?;
	Ok(leading_comment(snapshot, &line).is_some())
}

/// Plans commenting out every line the selection touches.
pub fn comment(snapshot: &BufferSnapshot, selection: Range<usize>) -> Result<EditPlan> {
	let lines = selected_lines(snapshot, selection)?;
	let mut plan = EditPlan::new(snapshot.id, snapshot.version);

	let mut targets = Vec::new();
	let mut all_commented = true;
	for index in lines.clone() {
		let line = line(snapshot, index)?;
		if line.is_blank() {
			continue;
		}
		if let Some(literal) = line.literal {
			let opener = snapshot.line_of(snapshot.tokens()[literal].start);
			if !targets.iter().any(|&(i, _)| i == opener) {
				continue;
			}
		}
		all_commented &= leading_comment(snapshot, &line).is_some();
		targets.push((index, line.range.start));
	}

	if all_commented {
		debug!(buffer_id = %snapshot.id, lines = ?lines, "comment.already_commented");
		return Ok(plan);
	}
	for (_, start) in targets {
		plan.push(TextEdit::insert(start, MARKER));
	}
	Ok(plan)
}

/// Plans removing one level of `;` commenting from every commented line the
/// selection touches.
pub fn uncomment(snapshot: &BufferSnapshot, selection: Range<usize>) -> Result<EditPlan> {
	let lines = selected_lines(snapshot, selection)?;
	let mut plan = EditPlan::new(snapshot.id, snapshot.version);
	for index in lines {
		let line = line(snapshot, index)?;
		if let Some(start) = leading_comment(snapshot, &line) {
			plan.push(TextEdit::delete(start..start + MARKER.len()));
		}
	}
	Ok(plan)
}

/// Start of the line's leading `;` comment token.
fn leading_comment(snapshot: &BufferSnapshot, line: &Line) -> Option<usize> {
	let token = &snapshot.tokens()[line.leading?];
	(token.kind == TokenKind::Comment && token.text.starts_with(MARKER)).then_some(token.start)
}
