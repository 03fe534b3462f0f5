use std::ops::Range;

use lisle_buffer::BufferSnapshot;
use lisle_lexer::{Token, TokenKind, form_at, top_level_forms};

/// The top-level form at `offset` and its text.
///
/// Prefers the form containing `offset`, then the closest one before it.
pub fn current_form(snapshot: &BufferSnapshot, offset: usize) -> Option<(Range<usize>, String)> {
	let form = form_at(snapshot.tokens(), offset)?;
	let text = snapshot.slice_to_string(form.span.clone());
	Some((form.span, text))
}

/// Name declared by the first `(ns name ...)` form, skipping metadata such as
/// `(ns ^:no-doc app.core)` or `(ns ^{:author "x"} app.core)`.
pub fn namespace_of(tokens: &[Token]) -> Option<String> {
	top_level_forms(tokens).into_iter().find_map(|form| {
		let tokens = &tokens[form.tokens];
		let mut i = next_significant(tokens, 0)?;
		if tokens[i].kind != TokenKind::OpenParen {
			return None;
		}
		i = next_significant(tokens, i + 1)?;
		if tokens[i].kind != TokenKind::Symbol || tokens[i].text != "ns" {
			return None;
		}
		i = next_significant(tokens, i + 1)?;
		while tokens[i].kind == TokenKind::ReaderMacro && tokens[i].text == "^" {
			let meta = next_significant(tokens, i + 1)?;
			i = next_significant(tokens, skip_form(tokens, meta))?;
		}
		(tokens[i].kind == TokenKind::Symbol).then(|| tokens[i].text.clone())
	})
}

fn next_significant(tokens: &[Token], from: usize) -> Option<usize> {
	(from..tokens.len()).find(|&i| !tokens[i].kind.is_trivia())
}

/// Index just past the form starting at `start`.
fn skip_form(tokens: &[Token], start: usize) -> usize {
	if !tokens[start].kind.is_open() {
		return start + 1;
	}
	let mut depth = 0usize;
	for (i, token) in tokens.iter().enumerate().skip(start) {
		if token.kind.is_open() {
			depth += 1;
		} else if token.kind.is_close() {
			depth -= 1;
			if depth == 0 {
				return i + 1;
			}
		}
	}
	tokens.len()
}
