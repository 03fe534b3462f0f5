//! Canned submissions: loading a file and switching namespace.

use std::path::Path;

use crate::{ReplSession, Result, SubmissionId};

/// `(load-file "<path>")` for `path`.
pub fn load_file_form(path: &Path) -> String {
	format!("(load-file {})", string_literal(&path.to_string_lossy()))
}

/// `(in-ns '<namespace>)`.
pub fn switch_namespace_form(namespace: &str) -> String {
	format!("(in-ns '{namespace})")
}

/// Asks the interpreter to load the file at `path`.
pub fn load_file(session: &ReplSession, path: &Path) -> Result<SubmissionId> {
	session.submit(&load_file_form(path))
}

/// Switches the interpreter's current namespace.
pub fn switch_namespace(session: &ReplSession, namespace: &str) -> Result<SubmissionId> {
	session.submit(&switch_namespace_form(namespace))
}

fn string_literal(text: &str) -> String {
	let mut out = String::with_capacity(text.len() + 2);
	out.push('"');
	for c in text.chars() {
		if matches!(c, '"' | '\\') {
			out.push('\\');
		}
		out.push(c);
	}
	out.push('"');
	out
}
