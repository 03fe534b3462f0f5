//! The interpreter's line protocol: how submissions are framed and how the
//! end of an evaluation is recognised in its output.

use std::sync::LazyLock;
use std::time::Duration;

use lisle_lexer::{TokenKind, tokenize, top_level_forms};
use lisle_primitives::ProjectConfig;
use regex::Regex;

use crate::{Error, Result};

/// Prompt printed by `clojure.main` and compatible REPLs, e.g. `user=> `.
pub const DEFAULT_PROMPT: &str = r"[^\s=>]+=> ";

static DEFAULT_PROMPT_RE: LazyLock<Regex> =
	LazyLock::new(|| anchored(DEFAULT_PROMPT).expect("default prompt is a valid regex"));

const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Prompt detection and timeouts for one kind of interpreter.
#[derive(Debug, Clone)]
pub struct ReplProtocol {
	prompt: Regex,
	/// How long to wait for the first prompt before assuming the interpreter
	/// is ready anyway.
	pub startup_timeout: Duration,
	/// How long to wait for a graceful exit, and then again after a kill.
	pub stop_timeout: Duration,
}

impl Default for ReplProtocol {
	fn default() -> Self {
		Self {
			prompt: DEFAULT_PROMPT_RE.clone(),
			startup_timeout: DEFAULT_STARTUP_TIMEOUT,
			stop_timeout: DEFAULT_STOP_TIMEOUT,
		}
	}
}

impl ReplProtocol {
	/// Protocol with a custom prompt pattern. The pattern is matched at the
	/// start of each output line.
	pub fn with_prompt(prompt: &str) -> Result<Self> {
		let prompt = anchored(prompt).map_err(|e| Error::Configuration(format!("invalid repl.prompt: {e}")))?;
		Ok(Self {
			prompt,
			..Self::default()
		})
	}

	/// Reads `repl.prompt`, `repl.startup_timeout_ms` and `repl.stop_timeout_ms`.
	pub fn from_config(project: &dyn ProjectConfig) -> Result<Self> {
		let mut protocol = match project.get("repl.prompt") {
			Some(prompt) => Self::with_prompt(&prompt)?,
			None => Self::default(),
		};
		if let Some(ms) = millis(project, "repl.startup_timeout_ms")? {
			protocol.startup_timeout = ms;
		}
		if let Some(ms) = millis(project, "repl.stop_timeout_ms")? {
			protocol.stop_timeout = ms;
		}
		Ok(protocol)
	}

	/// Sets the startup timeout.
	pub fn startup_timeout(mut self, timeout: Duration) -> Self {
		self.startup_timeout = timeout;
		self
	}

	/// Sets the stop timeout.
	pub fn stop_timeout(mut self, timeout: Duration) -> Self {
		self.stop_timeout = timeout;
		self
	}

	/// Frames source text as a submission.
	///
	/// Each top-level form goes on its own line, so a line-oriented REPL answers
	/// every form with exactly one prompt. Comments and `#_` discards are dropped
	/// since the reader never answers them.
	pub fn frame(&self, text: &str) -> Result<Framed> {
		let tokens = tokenize(text);
		let mut framed = Framed {
			text: String::with_capacity(text.len() + 1),
			prompts: 0,
		};

		for form in top_level_forms(&tokens) {
			let head = &tokens[form.tokens.start];
			if head.kind.is_close() {
				return Err(Error::UnbalancedSubmission { offset: head.start });
			}
			if !form.complete {
				return Err(Error::IncompleteSubmission);
			}
			if head.kind == TokenKind::ReaderMacro && head.text == "#_" {
				continue;
			}
			framed.text.push_str(&text[form.span]);
			framed.text.push('\n');
			framed.prompts += 1;
		}

		if framed.prompts == 0 {
			return Err(Error::EmptySubmission);
		}
		Ok(framed)
	}

	pub(crate) fn scanner(&self) -> OutputScanner {
		OutputScanner {
			prompt: self.prompt.clone(),
			pending: String::new(),
		}
	}
}

fn anchored(prompt: &str) -> std::result::Result<Regex, regex::Error> {
	Regex::new(&format!("^(?:{prompt})"))
}

fn millis(project: &dyn ProjectConfig, key: &str) -> Result<Option<Duration>> {
	project
		.get(key)
		.map(|raw| {
			raw.trim()
				.parse()
				.map(Duration::from_millis)
				.map_err(|_| Error::Configuration(format!("{key} must be a whole number of milliseconds, got {raw:?}")))
		})
		.transpose()
}

/// A submission ready to write to the interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Framed {
	/// Text to write, newline terminated.
	pub text: String,
	/// Number of prompts that complete this submission.
	pub prompts: usize,
}

/// A piece of interpreter output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
	Text(String),
	Prompt,
}

/// Splits stdout into text and prompts.
///
/// Complete lines are released as soon as they arrive. A partial line is held
/// back until it either turns into a prompt or is completed by a newline.
#[derive(Debug)]
pub(crate) struct OutputScanner {
	prompt: Regex,
	pending: String,
}

impl OutputScanner {
	pub fn feed(&mut self, chunk: &str) -> Vec<Segment> {
		self.pending.push_str(chunk);
		let mut segments = Vec::new();
		loop {
			if let Some(m) = self.prompt.find(&self.pending).filter(|m| m.end() > 0) {
				self.pending.drain(..m.end());
				segments.push(Segment::Prompt);
			} else if let Some(newline) = self.pending.find('\n') {
				let line: String = self.pending.drain(..=newline).collect();
				match segments.last_mut() {
					Some(Segment::Text(text)) => text.push_str(&line),
					_ => segments.push(Segment::Text(line)),
				}
			} else {
				return segments;
			}
		}
	}

	/// Releases a trailing partial line, e.g. at end of output.
	pub fn flush(&mut self) -> Option<String> {
		(!self.pending.is_empty()).then(|| std::mem::take(&mut self.pending))
	}
}

#[cfg(test)]
mod tests {
	use lisle_primitives::StaticConfig;
	use pretty_assertions::assert_eq;
	use rstest::rstest;

	use super::*;

	fn text(s: &str) -> Segment {
		Segment::Text(s.to_string())
	}

	#[test]
	fn test_frame_puts_each_form_on_its_own_line() {
		let framed = ReplProtocol::default()
			.frame("(def x 1) ; set x\n(+ x\n   2)")
			.expect("complete");
		assert_eq!(framed.text, "(def x 1)\n(+ x\n   2)\n");
		assert_eq!(framed.prompts, 2);
	}

	#[test]
	fn test_frame_drops_discarded_forms() {
		let framed = ReplProtocol::default().frame("#_(boom) 'sym").expect("complete");
		assert_eq!(framed.text, "'sym\n");
		assert_eq!(framed.prompts, 1);
	}

	#[rstest]
	#[case("")]
	#[case("   \n")]
	#[case(";; only a comment")]
	#[case("#_ (ignored)")]
	fn test_frame_rejects_empty(#[case] source: &str) {
		assert!(matches!(ReplProtocol::default().frame(source), Err(Error::EmptySubmission)));
	}

	#[rstest]
	#[case("(+ 1")]
	#[case("(str \"open)")]
	#[case("'")]
	fn test_frame_rejects_incomplete(#[case] source: &str) {
		assert!(matches!(ReplProtocol::default().frame(source), Err(Error::IncompleteSubmission)));
	}

	#[rstest]
	#[case("(a))", 3)]
	#[case(")", 0)]
	#[case("(a) ] (b", 4)]
	fn test_frame_rejects_unmatched_closer(#[case] source: &str, #[case] at: usize) {
		assert!(matches!(
			ReplProtocol::default().frame(source),
			Err(Error::UnbalancedSubmission { offset }) if offset == at
		));
	}

	#[test]
	fn test_scanner_splits_prompts_mid_chunk() {
		let mut scanner = ReplProtocol::default().scanner();
		assert_eq!(
			scanner.feed("3\nuser=> 7\nuser=> "),
			vec![text("3\n"), Segment::Prompt, text("7\n"), Segment::Prompt]
		);
		assert_eq!(scanner.flush(), None);
	}

	#[test]
	fn test_scanner_holds_partial_prompt_across_chunks() {
		let mut scanner = ReplProtocol::default().scanner();
		assert_eq!(scanner.feed("Clojure 1.12\nus"), vec![text("Clojure 1.12\n")]);
		assert_eq!(scanner.feed("er="), vec![]);
		assert_eq!(scanner.feed("> "), vec![Segment::Prompt]);
	}

	#[test]
	fn test_scanner_namespaced_prompt_and_arrows_in_output() {
		let mut scanner = ReplProtocol::default().scanner();
		assert_eq!(
			scanner.feed("\"a => b\"\napp.core=> "),
			vec![text("\"a => b\"\n"), Segment::Prompt]
		);
	}

	#[test]
	fn test_scanner_flushes_partial_line() {
		let mut scanner = ReplProtocol::default().scanner();
		assert_eq!(scanner.feed("no newline"), vec![]);
		assert_eq!(scanner.flush().as_deref(), Some("no newline"));
	}

	#[test]
	fn test_custom_prompt_and_timeouts_from_config() {
		let project = StaticConfig::new("/p")
			.with("repl.prompt", r"> ")
			.with("repl.startup_timeout_ms", "1500")
			.with("repl.stop_timeout_ms", "250");
		let protocol = ReplProtocol::from_config(&project).expect("valid");
		assert_eq!(protocol.startup_timeout, Duration::from_millis(1500));
		assert_eq!(protocol.stop_timeout, Duration::from_millis(250));
		assert_eq!(protocol.scanner().feed("ok\n> "), vec![text("ok\n"), Segment::Prompt]);
	}

	#[test]
	fn test_invalid_config_values() {
		let bad_prompt = StaticConfig::new("/p").with("repl.prompt", "(unclosed");
		assert!(matches!(ReplProtocol::from_config(&bad_prompt), Err(Error::Configuration(_))));
		let bad_timeout = StaticConfig::new("/p").with("repl.stop_timeout_ms", "soon");
		assert!(matches!(ReplProtocol::from_config(&bad_timeout), Err(Error::Configuration(_))));
	}
}
