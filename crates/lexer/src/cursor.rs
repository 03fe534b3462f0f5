use std::iter::Peekable;
use std::sync::LazyLock;

use regex::Regex;

use super::token::{Token, TokenKind};

/// Clojure's reader grammar for integers, ratios and floats, with optional sign.
static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(concat!(
		r"^[-+]?(?:",
		r"(?:0[xX][0-9A-Fa-f]+|0[0-7]*|[1-9][0-9]*|[1-9][0-9]?[rR][0-9A-Za-z]+)N?",
		r"|[0-9]+/[0-9]+",
		r"|[0-9]+(?:\.[0-9]*)?(?:[eE][-+]?[0-9]+)?M?",
		r")$",
	))
	.expect("number grammar is a valid regex")
});

/// Token iterator over a stream of characters.
///
/// Tracks the byte offset of the stream so tokens carry absolute positions
/// even when lexing restarts in the middle of a buffer. Every decision looks at
/// most one character past the end of the token being built, which is what
/// makes restarting at a token boundary sound.
pub struct Cursor<I: Iterator<Item = char>> {
	chars: Peekable<I>,
	offset: usize,
	text: String,
}

impl<I: Iterator<Item = char>> Cursor<I> {
	/// Creates a cursor whose first character sits at byte `offset`.
	pub fn new(chars: I, offset: usize) -> Self {
		Self {
			chars: chars.peekable(),
			offset,
			text: String::new(),
		}
	}

	/// Byte offset of the next unread character.
	pub fn offset(&self) -> usize {
		self.offset
	}

	/// Peeks the next character without consuming it.
	fn first(&mut self) -> Option<char> {
		self.chars.peek().copied()
	}

	/// Moves to the next character, appending it to the current token.
	fn bump(&mut self) -> Option<char> {
		let c = self.chars.next()?;
		self.offset += c.len_utf8();
		self.text.push(c);
		Some(c)
	}

	/// Consumes the next character if it equals `expected`.
	fn eat(&mut self, expected: char) -> bool {
		if self.first() == Some(expected) {
			self.bump();
			true
		} else {
			false
		}
	}

	fn eat_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
		while self.first().is_some_and(&mut predicate) {
			self.bump();
		}
	}

	/// Scans the body of a string or regex literal after its opening quote.
	fn string_body(&mut self, closed: TokenKind, open: TokenKind) -> TokenKind {
		loop {
			match self.bump() {
				Some('"') => return closed,
				Some('\\') => {
					if self.bump().is_none() {
						return open;
					}
				}
				Some(_) => {}
				None => return open,
			}
		}
	}

	fn number_or_unknown(&mut self) -> TokenKind {
		self.eat_while(is_constituent);
		if NUMBER.is_match(&self.text) {
			TokenKind::Number
		} else {
			TokenKind::Unknown
		}
	}

	fn symbol(&mut self) -> TokenKind {
		self.eat_while(is_constituent);
		match self.text.as_str() {
			"true" | "false" => TokenKind::Boolean,
			"nil" => TokenKind::Nil,
			_ => TokenKind::Symbol,
		}
	}

	/// Lexes everything after a `#`.
	fn dispatch(&mut self) -> TokenKind {
		match self.first() {
			Some('(') => {
				self.bump();
				TokenKind::OpenFn
			}
			Some('{') => {
				self.bump();
				TokenKind::OpenSet
			}
			Some('"') => {
				self.bump();
				self.string_body(TokenKind::Regex, TokenKind::UnterminatedRegex)
			}
			Some('!') => {
				self.eat_while(|c| c != '\n');
				TokenKind::Comment
			}
			Some('_' | '\'' | '=') => {
				self.bump();
				TokenKind::ReaderMacro
			}
			Some('?') => {
				self.bump();
				self.eat('@');
				TokenKind::ReaderMacro
			}
			// Symbolic values such as `##Inf`.
			Some('#') => {
				self.bump();
				self.eat_while(is_constituent);
				TokenKind::Symbol
			}
			// Namespaced maps (`#:ns{}`) and tagged literals (`#inst`).
			Some(c) if c == ':' || is_constituent(c) => {
				self.bump();
				self.eat_while(is_constituent);
				TokenKind::ReaderMacro
			}
			_ => TokenKind::Unknown,
		}
	}
}

impl<I: Iterator<Item = char>> Iterator for Cursor<I> {
	type Item = Token;

	fn next(&mut self) -> Option<Token> {
		let start = self.offset;
		let first_char = self.bump()?;

		let kind = match first_char {
			c if is_blank(c) => {
				self.eat_while(is_blank);
				TokenKind::Whitespace
			}

			';' => {
				self.eat_while(|c| c != '\n');
				TokenKind::Comment
			}

			'(' => TokenKind::OpenParen,
			')' => TokenKind::CloseParen,
			'[' => TokenKind::OpenBracket,
			']' => TokenKind::CloseBracket,
			'{' => TokenKind::OpenBrace,
			'}' => TokenKind::CloseBrace,

			'"' => self.string_body(TokenKind::String, TokenKind::UnterminatedString),

			// `\` takes the next character whatever it is, then any alphanumerics
			// for named and unicode characters.
			'\\' => match self.bump() {
				Some(c) if c.is_alphanumeric() => {
					self.eat_while(char::is_alphanumeric);
					TokenKind::Character
				}
				Some(_) => TokenKind::Character,
				None => TokenKind::Unknown,
			},

			':' => {
				self.eat_while(is_constituent);
				TokenKind::Keyword
			}

			'\'' | '`' | '@' | '^' => TokenKind::ReaderMacro,
			'~' => {
				self.eat('@');
				TokenKind::ReaderMacro
			}

			'#' => self.dispatch(),

			'0'..='9' => self.number_or_unknown(),
			'+' | '-' if self.first().is_some_and(|c| c.is_ascii_digit()) => self.number_or_unknown(),

			_ => self.symbol(),
		};

		let text = std::mem::take(&mut self.text);
		Some(Token { kind, start, text })
	}
}

/// Blank space, with commas treated as whitespace.
#[inline]
pub fn is_blank(c: char) -> bool {
	c.is_whitespace() || c == ','
}

/// Characters that end a symbol, keyword or number.
#[inline]
pub fn is_terminator(c: char) -> bool {
	matches!(c, '"' | ';' | '@' | '^' | '`' | '~' | '(' | ')' | '[' | ']' | '{' | '}' | '\\')
}

/// Characters that may continue a symbol, keyword or number.
#[inline]
pub fn is_constituent(c: char) -> bool {
	!is_blank(c) && !is_terminator(c)
}
