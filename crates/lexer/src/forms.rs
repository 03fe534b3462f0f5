//! Top-level form discovery over a token sequence.

use std::ops::Range;

use crate::{Token, TokenKind};

/// A top-level form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
	/// Byte span from the first to the last token of the form.
	pub span: Range<usize>,
	/// Index range of the form's tokens.
	pub tokens: Range<usize>,
	/// False when an opener is never closed, a literal is unterminated, or a
	/// reader macro has nothing to apply to.
	pub complete: bool,
}

/// Splits a token sequence into its top-level forms.
///
/// Reader macros attach to the form that follows them. Delimiters are counted
/// by direction only, so `(]` closes; a stray closer at depth zero is a form of
/// its own.
pub fn top_level_forms(tokens: &[Token]) -> Vec<Form> {
	let mut forms = Vec::new();
	let mut i = 0;
	while i < tokens.len() {
		if tokens[i].kind.is_trivia() {
			i += 1;
			continue;
		}
		let (end, complete) = scan_form(tokens, i);
		forms.push(Form {
			span: tokens[i].start..tokens[end - 1].end(),
			tokens: i..end,
			complete,
		});
		i = end;
	}
	forms
}

/// Finds the top-level form under `offset`.
///
/// A form containing `offset` wins, then a form ending exactly at `offset`
/// (cursor right after a closing paren), then the closest form before it.
pub fn form_at(tokens: &[Token], offset: usize) -> Option<Form> {
	let forms = top_level_forms(tokens);
	if let Some(form) = forms.iter().find(|f| f.span.start <= offset && offset < f.span.end) {
		return Some(form.clone());
	}
	forms.into_iter().rev().find(|f| f.span.end <= offset)
}

/// Scans one form starting at non-trivia token `start`. Returns the exclusive
/// end token index and whether the form is complete.
fn scan_form(tokens: &[Token], start: usize) -> (usize, bool) {
	let mut i = start;

	// Prefixes such as `'`, `#_` and `^` apply to the next form.
	while tokens[i].kind == TokenKind::ReaderMacro {
		i += 1;
		while i < tokens.len() && tokens[i].kind.is_trivia() {
			i += 1;
		}
		if i == tokens.len() {
			let last = last_non_trivia(tokens, start, i);
			return (last + 1, false);
		}
	}

	let kind = tokens[i].kind;
	if !kind.is_open() {
		return (i + 1, !kind.is_unterminated());
	}

	let mut depth = 0usize;
	let mut complete = true;
	while i < tokens.len() {
		let kind = tokens[i].kind;
		if kind.is_open() {
			depth += 1;
		} else if kind.is_close() {
			depth -= 1;
			if depth == 0 {
				return (i + 1, complete);
			}
		} else if kind.is_unterminated() {
			complete = false;
		}
		i += 1;
	}

	let last = last_non_trivia(tokens, start, tokens.len());
	(last + 1, false)
}

fn last_non_trivia(tokens: &[Token], start: usize, end: usize) -> usize {
	(start..end).rev().find(|&j| !tokens[j].kind.is_trivia()).unwrap_or(start)
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;
	use crate::tokenize;

	fn spans(source: &str) -> Vec<(&str, bool)> {
		top_level_forms(&tokenize(source))
			.into_iter()
			.map(|f| (&source[f.span], f.complete))
			.collect()
	}

	#[test]
	fn test_atoms_and_lists() {
		assert_eq!(
			spans("(ns app.core)\n\n(defn f [x] x) 42 :k"),
			vec![("(ns app.core)", true), ("(defn f [x] x)", true), ("42", true), (":k", true)]
		);
	}

	#[test]
	fn test_reader_macros_attach_to_next_form() {
		assert_eq!(spans("'(1 2) #_ (skip) @state"), vec![("'(1 2)", true), ("#_ (skip)", true), ("@state", true)]);
	}

	#[test]
	fn test_comments_are_not_forms() {
		assert_eq!(spans(";; header\n(a) ; trailing\n"), vec![("(a)", true)]);
	}

	#[test]
	fn test_incomplete_forms() {
		assert_eq!(spans("(a (b)\n"), vec![("(a (b)", false)]);
		assert_eq!(spans("(str \"open"), vec![("(str \"open", false)]);
		assert_eq!(spans("' "), vec![("'", false)]);
	}

	#[test]
	fn test_stray_closer_is_its_own_form() {
		assert_eq!(spans(") (a)"), vec![(")", true), ("(a)", true)]);
	}

	#[test]
	fn test_form_at_prefers_containing_then_preceding() {
		let source = "(a 1)\n\n(b 2)";
		let tokens = tokenize(source);
		let at = |offset| form_at(&tokens, offset).map(|f| &source[f.span]);
		assert_eq!(at(2), Some("(a 1)"));
		assert_eq!(at(5), Some("(a 1)"));
		assert_eq!(at(6), Some("(a 1)"));
		assert_eq!(at(7), Some("(b 2)"));
		assert_eq!(at(source.len()), Some("(b 2)"));
		assert_eq!(form_at(&tokenize("  "), 1), None);
	}
}
