use lisle_primitives::{EditWindow, RopeSlice};

use crate::{Cursor, Token};

/// Re-tokenizes `text` after an edit, reusing `old` where the edit cannot reach.
///
/// `old` must be the tokens of the text before the edit and `window` the span
/// the edit touched. Lexing restarts at the token holding the byte just before
/// the edit, because that token's extent was decided by peeking at the first
/// edited byte. It stops as soon as a fresh token starts on a boundary that an
/// old token also started on past the edit; from there both lexers see the same
/// suffix, so the remaining old tokens are reused with shifted offsets.
pub fn relex(old: &[Token], text: RopeSlice<'_>, window: EditWindow) -> Vec<Token> {
	let probe = window.start.saturating_sub(1);
	let restart_idx = old.partition_point(|t| t.end() <= probe);
	let restart = match old.get(restart_idx) {
		Some(token) => token.start,
		None => old.last().map_or(0, Token::end),
	};
	let restart = restart.min(text.len_bytes());

	let delta = window.delta();
	let mut tokens: Vec<Token> = old[..restart_idx].to_vec();
	let mut old_idx = restart_idx;

	let cursor = Cursor::new(text.chars_at(text.byte_to_char(restart)), restart);
	for token in cursor {
		if token.start >= window.new_end {
			let old_start = shift(token.start, -delta);
			while old_idx < old.len() && old[old_idx].start < old_start {
				old_idx += 1;
			}
			if old_idx < old.len() && old[old_idx].start == old_start {
				tokens.extend(old[old_idx..].iter().map(|t| Token {
					start: shift(t.start, delta),
					..t.clone()
				}));
				return tokens;
			}
		}
		tokens.push(token);
	}

	tokens
}

#[inline]
fn shift(offset: usize, delta: isize) -> usize {
	offset.wrapping_add_signed(delta)
}
