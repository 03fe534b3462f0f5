//! Depth-based indentation.
//!
//! A line's depth is the number of delimiters opened before it and not yet
//! closed, less any closers the line itself starts with. Its indentation is
//! `indent_size * depth` spaces. Tabs are always replaced by spaces.

use lisle_buffer::BufferSnapshot;
use lisle_primitives::{EditPlan, ProjectConfig, TextEdit};

use crate::lines::{Line, leading_whitespace, line};
use crate::{Error, Result};

/// Indentation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndentOptions {
	/// Spaces per nesting level.
	pub indent_size: usize,
}

impl Default for IndentOptions {
	fn default() -> Self {
		Self { indent_size: 2 }
	}
}

impl IndentOptions {
	const INDENT_SIZE_KEY: &'static str = "editor.indent_size";

	/// Reads `editor.indent_size`, falling back to the default when unset.
	pub fn from_config(config: &dyn ProjectConfig) -> Result<Self> {
		let Some(value) = config.get(Self::INDENT_SIZE_KEY) else {
			return Ok(Self::default());
		};
		let indent_size = value.trim().parse().map_err(|_| Error::InvalidOption {
			key: Self::INDENT_SIZE_KEY,
			value,
		})?;
		Ok(Self { indent_size })
	}
}

/// Target indentation width for `line`, or `None` when the line starts inside a
/// multi-line literal and must be left as is.
pub fn target_indent(snapshot: &BufferSnapshot, index: usize, options: IndentOptions) -> Result<Option<usize>> {
	let line = line(snapshot, index)?;
	Ok(Depth::default().of(snapshot, &line).map(|depth| depth * options.indent_size))
}

/// Plans re-indenting one line.
pub fn compute_indent(snapshot: &BufferSnapshot, index: usize, options: IndentOptions) -> Result<EditPlan> {
	let line = line(snapshot, index)?;
	let mut plan = EditPlan::new(snapshot.id, snapshot.version);
	if let Some(depth) = Depth::default().of(snapshot, &line) {
		reindent(snapshot, &line, depth * options.indent_size, &mut plan);
	}
	Ok(plan)
}

/// Plans re-indenting every line. Whitespace-only lines are emptied.
pub fn format_document(snapshot: &BufferSnapshot, options: IndentOptions) -> Result<EditPlan> {
	let mut plan = EditPlan::new(snapshot.id, snapshot.version);
	let mut scan = Depth::default();
	for index in 0..snapshot.len_lines() {
		let line = line(snapshot, index)?;
		if line.is_blank() {
			if !line.range.is_empty() {
				plan.push(TextEdit::delete(line.range.clone()));
			}
			continue;
		}
		if let Some(depth) = scan.of(snapshot, &line) {
			reindent(snapshot, &line, depth * options.indent_size, &mut plan);
		}
	}
	Ok(plan)
}

fn reindent(snapshot: &BufferSnapshot, line: &Line, width: usize, plan: &mut EditPlan) {
	let start = line.range.start;
	let current = leading_whitespace(snapshot, &line.range);
	let text = snapshot.text.byte_slice(start..start + current);
	if current == width && text.chars().all(|c| c == ' ') {
		return;
	}
	plan.push(TextEdit::replace(start..start + current, " ".repeat(width)));
}

/// Running delimiter depth. Lines must be queried in ascending order.
#[derive(Debug, Default)]
struct Depth {
	next: usize,
	open: usize,
}

impl Depth {
	fn of(&mut self, snapshot: &BufferSnapshot, line: &Line) -> Option<usize> {
		let tokens = snapshot.tokens();
		while let Some(token) = tokens.get(self.next).filter(|t| t.start < line.range.start) {
			if token.kind.is_open() {
				self.open += 1;
			} else if token.kind.is_close() {
				self.open = self.open.saturating_sub(1);
			}
			self.next += 1;
		}
		if line.literal.is_some() {
			return None;
		}

		// A line that starts by closing is indented to the depth it closes to.
		let mut depth = self.open;
		let Some(leading) = line.leading else {
			return Some(depth);
		};
		for token in &tokens[leading..] {
			if token.start >= line.range.end || !(token.kind.is_close() || token.kind.is_trivia()) {
				break;
			}
			if token.kind.is_close() {
				depth = depth.saturating_sub(1);
			}
		}
		Some(depth)
	}
}
