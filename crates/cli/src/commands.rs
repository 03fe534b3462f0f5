use std::io::Write;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use lisle_bridge::{DocumentEvents, EditorBridge};
use lisle_primitives::{BufferId, EditPlan, ProjectFile};
use lisle_repl::{Evaluation, ReplProtocol, ReplSession, TokioSpawner};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

const BUFFER: BufferId = BufferId(1);
const READY_TIMEOUT: Duration = Duration::from_secs(120);
const EVAL_TIMEOUT: Duration = Duration::from_secs(300);
const EXIT_TIMEOUT: Duration = Duration::from_secs(10);

fn open(project: &ProjectFile, file: &Path) -> anyhow::Result<EditorBridge> {
	let text = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
	let bridge = EditorBridge::new(Arc::new(TokioSpawner)).with_project_options(project)?;
	bridge.document_created(BUFFER, Some(file), &text)?;
	Ok(bridge)
}

/// Applies `plan` to the tracked buffer and returns the new text.
fn apply(bridge: &EditorBridge, plan: &EditPlan) -> anyhow::Result<String> {
	let snapshot = bridge.snapshot(plan.buffer)?;
	let changes = plan.to_change_set(snapshot.len_bytes())?;
	bridge.buffer_changed(plan.buffer, &changes)?;
	debug!(edits = plan.edits.len(), base_version = plan.base_version, "lisle.plan_applied");
	Ok(bridge.snapshot(plan.buffer)?.text.to_string())
}

pub fn tokenize(project: &ProjectFile, file: &Path) -> anyhow::Result<()> {
	let bridge = open(project, file)?;
	let mut out = std::io::stdout().lock();
	for token in bridge.get_tokens(BUFFER)?.iter() {
		writeln!(out, "{:>6}..{:<6} {:<20} {:?}", token.start, token.end(), token.kind, token.text)?;
	}
	Ok(())
}

pub fn format(project: &ProjectFile, file: &Path, write: bool) -> anyhow::Result<()> {
	let bridge = open(project, file)?;
	let plan = bridge.format(BUFFER)?;
	let text = apply(&bridge, &plan)?;
	if write {
		if !plan.is_empty() {
			std::fs::write(file, &text).with_context(|| format!("writing {}", file.display()))?;
			info!(file = %file.display(), edits = plan.edits.len(), "lisle.formatted");
		}
	} else {
		print!("{text}");
	}
	Ok(())
}

pub fn indent(project: &ProjectFile, file: &Path, line: usize) -> anyhow::Result<()> {
	let Some(index) = line.checked_sub(1) else {
		bail!("line numbers start at 1");
	};
	let bridge = open(project, file)?;
	let plan = bridge.compute_indent(BUFFER, index)?;
	print!("{}", apply(&bridge, &plan)?);
	Ok(())
}

pub fn toggle_comment(project: &ProjectFile, file: &Path, start: usize, end: usize, comment: bool) -> anyhow::Result<()> {
	let bridge = open(project, file)?;
	let range = line_span(&bridge, start, end)?;
	let plan = if comment {
		bridge.apply_block_comment(BUFFER, range)?
	} else {
		bridge.apply_block_uncomment(BUFFER, range)?
	};
	print!("{}", apply(&bridge, &plan)?);
	Ok(())
}

/// Byte span from the start of line `start` to the end of line `end`, both
/// one-based and inclusive.
fn line_span(bridge: &EditorBridge, start: usize, end: usize) -> anyhow::Result<Range<usize>> {
	if start == 0 || end < start {
		bail!("invalid line range {start}..={end}");
	}
	let snapshot = bridge.snapshot(BUFFER)?;
	let lines = snapshot.len_lines();
	let (Some(first), Some(last)) = (snapshot.line_start(start - 1), snapshot.line_range(end - 1)) else {
		bail!("line range {start}..={end} is past the end of the file ({lines} lines)");
	};
	Ok(first..last.end)
}

pub async fn repl(project: &ProjectFile, eval: Vec<String>) -> anyhow::Result<()> {
	let bridge = EditorBridge::new(Arc::new(TokioSpawner));
	let handle = bridge.ensure_session(project).await?;
	let session = bridge.session(handle)?;

	let result = drive(&session, eval).await;

	bridge.stop(handle)?;
	let state = session.wait_terminated(EXIT_TIMEOUT).await?;
	debug!(session_id = %handle, %state, "lisle.repl_finished");
	result
}

async fn drive(session: &ReplSession, eval: Vec<String>) -> anyhow::Result<()> {
	session.wait_ready(READY_TIMEOUT).await?;

	if !eval.is_empty() {
		for form in eval {
			show(&session.evaluate(&form, EVAL_TIMEOUT).await?)?;
		}
		return Ok(());
	}

	let mut lines = BufReader::new(tokio::io::stdin()).lines();
	let mut pending = String::new();
	while let Some(line) = lines.next_line().await? {
		pending.push_str(&line);
		pending.push('\n');
		match step(session.protocol(), &pending) {
			Step::ReadMore => continue,
			Step::Skip => {}
			Step::Reject(message) => eprintln!("{message}"),
			Step::Evaluate => show(&session.evaluate(&pending, EVAL_TIMEOUT).await?)?,
		}
		pending.clear();
	}
	if !pending.trim().is_empty() {
		bail!("input ended inside an unfinished form");
	}
	Ok(())
}

/// What the stdin loop does with the input read so far.
#[derive(Debug, PartialEq, Eq)]
enum Step {
	Evaluate,
	/// A form is still open.
	ReadMore,
	/// Only whitespace or comments.
	Skip,
	/// Input no further line can fix; reported and dropped.
	Reject(String),
}

fn step(protocol: &ReplProtocol, pending: &str) -> Step {
	match protocol.frame(pending) {
		Ok(_) => Step::Evaluate,
		Err(lisle_repl::Error::IncompleteSubmission) => Step::ReadMore,
		Err(lisle_repl::Error::EmptySubmission) => Step::Skip,
		Err(e) => Step::Reject(e.to_string()),
	}
}

fn show(evaluation: &Evaluation) -> anyhow::Result<()> {
	let mut out = std::io::stdout().lock();
	out.write_all(evaluation.stdout.as_bytes())?;
	out.flush()?;
	if !evaluation.stderr.is_empty() {
		eprint!("{}", evaluation.stderr);
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn bridge_with(text: &str) -> EditorBridge {
		let bridge = EditorBridge::new(Arc::new(TokioSpawner));
		bridge.document_created(BUFFER, None, text).expect("created");
		bridge
	}

	#[test]
	fn test_line_span_covers_whole_lines() {
		let bridge = bridge_with("(a)\n(b)\n(c)\n");
		assert_eq!(line_span(&bridge, 2, 3).expect("in range"), 4..11);
		assert_eq!(line_span(&bridge, 1, 1).expect("in range"), 0..3);
	}

	#[test]
	fn test_step_waits_for_open_forms_and_drops_unmatched_closers() {
		let protocol = ReplProtocol::default();
		assert_eq!(step(&protocol, "(defn f [x]\n"), Step::ReadMore);
		assert_eq!(step(&protocol, "(defn f [x]\n  x)\n"), Step::Evaluate);
		assert_eq!(step(&protocol, "  ; note\n"), Step::Skip);
		assert_eq!(
			step(&protocol, ")\n"),
			Step::Reject("unmatched closing delimiter at byte 0".into())
		);
		assert_eq!(
			step(&protocol, "(+ 1 2))\n"),
			Step::Reject("unmatched closing delimiter at byte 7".into())
		);
	}

	#[test]
	fn test_line_span_rejects_bad_ranges() {
		let bridge = bridge_with("(a)\n(b)");
		assert!(line_span(&bridge, 0, 1).is_err());
		assert!(line_span(&bridge, 2, 1).is_err());
		assert!(line_span(&bridge, 1, 9).is_err());
	}
}
