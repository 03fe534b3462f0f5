//! Tokenizer for Clojure-family source text.
//!
//! [`tokenize`] is pure and total: it never fails, and the text of the tokens it
//! returns concatenates back to the input exactly. Malformed input degrades to
//! [`TokenKind::Unknown`] or one of the unterminated kinds instead of erroring.
//!
//! [`relex`] re-tokenizes only the region around an edit and splices the
//! untouched suffix of the previous token sequence back in. Its output is
//! always identical to a full [`tokenize`] of the new text.
//!
//! Matching delimiters is left to consumers; [`forms`] provides the common
//! top-level form queries.

mod cursor;
pub mod forms;
mod incremental;
mod token;


pub use cursor::{Cursor, is_blank, is_constituent, is_terminator};
pub use forms::{Form, form_at, top_level_forms};
pub use incremental::relex;
use lisle_primitives::RopeSlice;
pub use token::{Token, TokenKind};

/// Tokenizes `text` from scratch.
pub fn tokenize(text: &str) -> Vec<Token> {
	Cursor::new(text.chars(), 0).collect()
}

/// Tokenizes a rope without flattening it into a `String` first.
pub fn tokenize_rope(text: RopeSlice<'_>) -> Vec<Token> {
	Cursor::new(text.chars(), 0).collect()
}
