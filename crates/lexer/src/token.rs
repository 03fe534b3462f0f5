use std::fmt;
use std::ops::Range;

/// A single lexical token.
///
/// Blank space and comments are tokens too, and unrecognised input becomes
/// [`TokenKind::Unknown`], so the tokens of a text partition it without gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
	/// The kind of token.
	pub kind: TokenKind,
	/// Byte offset of the first byte of the token.
	pub start: usize,
	/// The source text covered by the token.
	pub text: String,
}

impl Token {
	pub fn new(kind: TokenKind, start: usize, text: impl Into<String>) -> Self {
		Self {
			kind,
			start,
			text: text.into(),
		}
	}

	/// Length of the token in bytes.
	#[inline]
	pub fn len(&self) -> usize {
		self.text.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.text.is_empty()
	}

	/// Byte offset one past the last byte of the token.
	#[inline]
	pub fn end(&self) -> usize {
		self.start + self.text.len()
	}

	#[inline]
	pub fn span(&self) -> Range<usize> {
		self.start..self.end()
	}

	/// True if `offset` lies inside the token (start inclusive, end exclusive).
	#[inline]
	pub fn contains(&self, offset: usize) -> bool {
		self.start <= offset && offset < self.end()
	}
}

/// Classification of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
	/// A run of blank space. Commas count as blank space.
	Whitespace,
	/// A `;` or `#!` comment, up to but excluding the line break.
	Comment,

	/// `(`
	OpenParen,
	/// `)`
	CloseParen,
	/// `[`
	OpenBracket,
	/// `]`
	CloseBracket,
	/// `{`
	OpenBrace,
	/// `}`
	CloseBrace,
	/// `#(`, the anonymous function literal opener.
	OpenFn,
	/// `#{`, the set literal opener.
	OpenSet,

	/// A closed `"..."` string literal.
	String,
	/// A closed `#"..."` regex literal.
	Regex,
	/// A character literal such as `\a`, `\newline` or `\u03A9`.
	Character,
	/// A numeric literal: integers, floats, ratios, hex, octal and radix forms.
	Number,
	/// `:name`, `::name` or `:ns/name`.
	Keyword,
	/// Any other constituent run.
	Symbol,
	/// `true` or `false`.
	Boolean,
	/// `nil`.
	Nil,
	/// Quote, syntax quote, unquote, deref, metadata and `#` dispatch prefixes.
	ReaderMacro,

	/// A string literal missing its closing quote. Extends to end of input.
	UnterminatedString,
	/// A regex literal missing its closing quote. Extends to end of input.
	UnterminatedRegex,
	/// Input that does not form a valid token, such as `1x` or a lone `#`.
	Unknown,
}

impl TokenKind {
	/// True for every opening delimiter, including `#(` and `#{`.
	pub fn is_open(self) -> bool {
		matches!(
			self,
			Self::OpenParen | Self::OpenBracket | Self::OpenBrace | Self::OpenFn | Self::OpenSet
		)
	}

	/// True for every closing delimiter.
	pub fn is_close(self) -> bool {
		matches!(self, Self::CloseParen | Self::CloseBracket | Self::CloseBrace)
	}

	/// Blank space and comments.
	pub fn is_trivia(self) -> bool {
		matches!(self, Self::Whitespace | Self::Comment)
	}

	/// Literals that can span several lines.
	pub fn is_multiline_literal(self) -> bool {
		matches!(
			self,
			Self::String | Self::Regex | Self::UnterminatedString | Self::UnterminatedRegex
		)
	}

	pub fn is_unterminated(self) -> bool {
		matches!(self, Self::UnterminatedString | Self::UnterminatedRegex)
	}
}

impl fmt::Display for TokenKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Whitespace => "whitespace",
			Self::Comment => "comment",
			Self::OpenParen => "open-paren",
			Self::CloseParen => "close-paren",
			Self::OpenBracket => "open-bracket",
			Self::CloseBracket => "close-bracket",
			Self::OpenBrace => "open-brace",
			Self::CloseBrace => "close-brace",
			Self::OpenFn => "open-fn",
			Self::OpenSet => "open-set",
			Self::String => "string",
			Self::Regex => "regex",
			Self::Character => "character",
			Self::Number => "number",
			Self::Keyword => "keyword",
			Self::Symbol => "symbol",
			Self::Boolean => "boolean",
			Self::Nil => "nil",
			Self::ReaderMacro => "reader-macro",
			Self::UnterminatedString => "unterminated-string",
			Self::UnterminatedRegex => "unterminated-regex",
			Self::Unknown => "unknown",
		};
		f.write_str(name)
	}
}
