use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lisle_primitives::{StaticConfig, TextEdit};
use lisle_repl::{ProcessControl, ProcessExit, ReplOutput, SpawnedProcess};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, duplex};
use tokio::sync::oneshot;

use super::*;

const WAIT: Duration = Duration::from_secs(5);
const CORE: &str = "(ns app.core\n  (:require [clojure.string :as str]))\n\n(defn greet [n]\n(str \"hi \" n))\n";

/// Interpreter that echoes every line it reads and prompts whenever its input
/// is balanced, like a reader that has just finished a form. Exits when its
/// stdin closes or it reads `(exit)`.
struct EchoSpawner;

struct EchoControl {
	exit: Option<oneshot::Receiver<()>>,
}

#[async_trait]
impl ProcessControl for EchoControl {
	async fn wait(&mut self) -> io::Result<ProcessExit> {
		if let Some(rx) = self.exit.as_mut() {
			let _ = rx.await;
			self.exit = None;
		}
		Ok(ProcessExit::Code(0))
	}

	async fn kill(&mut self) -> io::Result<()> {
		self.exit = None;
		Ok(())
	}
}

#[async_trait]
impl ProcessSpawner for EchoSpawner {
	async fn spawn(&self, _params: &LaunchParameters) -> io::Result<SpawnedProcess> {
		let (stdin, stdin_repl) = duplex(4096);
		let (stdout, mut stdout_repl) = duplex(4096);
		let (stderr, stderr_repl) = duplex(4096);
		let (exit_tx, exit_rx) = oneshot::channel();

		tokio::spawn(async move {
			let mut lines = BufReader::new(stdin_repl).lines();
			let mut depth = 0i64;
			let _ = stdout_repl.write_all(b"user=> ").await;
			while let Ok(Some(line)) = lines.next_line().await {
				if line == "(exit)" {
					break;
				}
				for c in line.chars() {
					match c {
						'(' | '[' | '{' => depth += 1,
						')' | ']' | '}' => depth -= 1,
						_ => {}
					}
				}
				let reply = if depth == 0 { format!("{line}\nuser=> ") } else { format!("{line}\n") };
				if stdout_repl.write_all(reply.as_bytes()).await.is_err() {
					break;
				}
			}
			drop(stdout_repl);
			drop(stderr_repl);
			let _ = exit_tx.send(());
		});

		Ok(SpawnedProcess {
			stdin: Box::new(stdin),
			stdout: Box::new(stdout),
			stderr: Box::new(stderr),
			control: Box::new(EchoControl { exit: Some(exit_rx) }),
		})
	}
}

fn bridge() -> EditorBridge {
	EditorBridge::new(Arc::new(EchoSpawner)).with_env_lookup(|_| None)
}

fn text_of(bridge: &EditorBridge, id: BufferId) -> String {
	bridge.snapshot(id).expect("tracked").text.to_string()
}

/// Applies a plan the way a host would and reports the edit back.
fn apply(bridge: &EditorBridge, plan: &EditPlan) -> String {
	let len = bridge.snapshot(plan.buffer).expect("tracked").len_bytes();
	let changes = plan.to_change_set(len).expect("plan fits buffer");
	bridge.buffer_changed(plan.buffer, &changes).expect("edit applies");
	text_of(bridge, plan.buffer)
}

/// Collects stdout of `submission` until the interpreter answers it.
async fn answer(output: &mut OutputStream, submission: SubmissionId) -> String {
	let mut text = String::new();
	loop {
		match tokio::time::timeout(WAIT, output.recv()).await.expect("answer in time") {
			Some(ReplOutput::Stdout { submission: Some(s), text: t }) if s == submission => text.push_str(&t),
			Some(ReplOutput::Completed { submission: s }) if s == submission => return text,
			Some(ReplOutput::Terminated { reason, .. }) => panic!("session ended: {reason}"),
			Some(_) => {}
			None => panic!("output ended"),
		}
	}
}

async fn ready_session(bridge: &EditorBridge) -> (SessionId, OutputStream) {
	let handle = bridge
		.start_session(LaunchParameters::new("echo-repl", "/work/app"), ReplProtocol::default())
		.await
		.expect("spawns");
	let output = bridge.output(handle).expect("first take");
	bridge.session(handle).expect("tracked").wait_ready(WAIT).await.expect("ready");
	(handle, output)
}

#[test]
fn test_document_lifecycle_drives_tokens() {
	let bridge = bridge();
	let id = BufferId(1);
	bridge.document_created(id, None, "(+ 1 2)").expect("created");

	let tokens = bridge.get_tokens(id).expect("tracked");
	assert_eq!(tokens.iter().map(|t| t.text.as_str()).collect::<String>(), "(+ 1 2)");

	let changes = ChangeSet::from_edits(7, [TextEdit::replace(5..6, "20")]).expect("valid");
	bridge.buffer_changed(id, &changes).expect("applies");
	let tokens = bridge.get_tokens(id).expect("tracked");
	assert_eq!(tokens.iter().map(|t| t.text.as_str()).collect::<String>(), "(+ 1 20)");

	bridge.document_disposed(id).expect("disposed");
	assert!(matches!(
		bridge.get_tokens(id),
		Err(Error::Buffer(lisle_buffer::Error::BufferNotTracked(_)))
	));
}

#[test]
fn test_comment_then_uncomment_restores_text() {
	let bridge = bridge();
	let id = BufferId(2);
	let original = ";; a\n(+ 1 2)";
	bridge.document_created(id, None, original).expect("created");

	let commented = apply(&bridge, &bridge.apply_block_comment(id, 0..original.len()).expect("plan"));
	assert_eq!(commented, ";;; a\n;(+ 1 2)");

	let again = bridge.apply_block_comment(id, 0..commented.len()).expect("plan");
	assert!(again.is_empty(), "already commented lines are left alone");

	let restored = apply(&bridge, &bridge.apply_block_uncomment(id, 0..commented.len()).expect("plan"));
	assert_eq!(restored, original);
}

#[test]
fn test_indent_and_format_use_configured_width() {
	let bridge = bridge();
	let id = BufferId(3);
	bridge.document_created(id, None, "(defn f []\n(let [x 1]\nx))").expect("created");

	let plan = bridge.compute_indent(id, 1).expect("plan");
	assert_eq!(apply(&bridge, &plan), "(defn f []\n  (let [x 1]\nx))");

	let project = StaticConfig::new("/work/app").with("editor.indent_size", "4");
	let wide = EditorBridge::new(Arc::new(EchoSpawner))
		.with_project_options(&project)
		.expect("valid options");
	assert_eq!(wide.indent_options(), IndentOptions { indent_size: 4 });
	wide.document_created(id, None, "(defn f []\n(let [x 1]\nx))").expect("created");
	let plan = wide.format(id).expect("plan");
	assert_eq!(apply(&wide, &plan), "(defn f []\n    (let [x 1]\n        x))");
}

#[test]
fn test_invalid_project_options_are_rejected() {
	let project = StaticConfig::new("/work/app").with("editor.indent_size", "wide");
	assert!(matches!(
		EditorBridge::new(Arc::new(EchoSpawner)).with_project_options(&project),
		Err(Error::Editing(lisle_editing::Error::InvalidOption { .. }))
	));
}

#[test]
fn test_commands_on_untracked_buffer_fail() {
	let bridge = bridge();
	let id = BufferId(99);
	assert!(matches!(bridge.apply_block_comment(id, 0..0), Err(Error::Buffer(_))));
	assert!(matches!(bridge.compute_indent(id, 0), Err(Error::Buffer(_))));
	assert!(matches!(bridge.format(id), Err(Error::Buffer(_))));
}

#[test]
fn test_out_of_range_line_is_an_editing_error() {
	let bridge = bridge();
	let id = BufferId(4);
	bridge.document_created(id, None, "(a)").expect("created");
	assert!(matches!(
		bridge.compute_indent(id, 5),
		Err(Error::Editing(lisle_editing::Error::LineOutOfRange { line: 5, .. }))
	));
}

#[test]
fn test_namespace_and_current_form() {
	let bridge = bridge();
	let id = BufferId(5);
	bridge.document_created(id, None, CORE).expect("created");

	assert_eq!(bridge.namespace(id).expect("tracked").as_deref(), Some("app.core"));
	let offset = CORE.find("greet").expect("present");
	let (_, form) = bridge.current_form(id, offset).expect("tracked").expect("form");
	assert_eq!(form, "(defn greet [n]\n(str \"hi \" n))");
}

#[tokio::test]
async fn test_submit_current_form_and_canned_operations() {
	let bridge = bridge();
	let id = BufferId(6);
	bridge
		.document_created(id, Some(Path::new("/work/app/src/app/core.clj")), CORE)
		.expect("created");
	let (handle, mut output) = ready_session(&bridge).await;

	let offset = CORE.find("defn").expect("present");
	let submission = bridge.submit_current_form(handle, id, offset).expect("submits");
	assert_eq!(answer(&mut output, submission).await, "(defn greet [n]\n(str \"hi \" n))\n");

	let submission = bridge.switch_to_buffer_namespace(handle, id).expect("submits");
	assert_eq!(answer(&mut output, submission).await, "(in-ns 'app.core)\n");

	let submission = bridge.load_active_file(handle, id).expect("submits");
	assert_eq!(
		answer(&mut output, submission).await,
		"(load-file \"/work/app/src/app/core.clj\")\n"
	);

	let ns_form = 0..CORE.find("\n\n").expect("blank line after ns");
	let submission = bridge.submit_selection(handle, id, ns_form).expect("submits");
	assert_eq!(bridge.session_state(handle).expect("tracked"), SessionState::Busy);
	assert!(matches!(
		bridge.submit(handle, "(+ 1 2)"),
		Err(Error::Repl(lisle_repl::Error::SessionBusy))
	));
	answer(&mut output, submission).await;

	bridge.stop(handle).expect("tracked");
	assert!(matches!(bridge.stop(handle), Err(Error::UnknownSession(_))));
}

#[tokio::test]
async fn test_buffer_preconditions_for_repl_operations() {
	let bridge = bridge();
	let id = BufferId(7);
	bridge.document_created(id, None, "  ; nothing here\n").expect("created");
	let (handle, _output) = ready_session(&bridge).await;

	assert!(matches!(bridge.load_active_file(handle, id), Err(Error::NoPath(_))));
	assert!(matches!(bridge.switch_to_buffer_namespace(handle, id), Err(Error::NoNamespace(_))));
	assert!(matches!(
		bridge.submit_current_form(handle, id, 3),
		Err(Error::NoFormAtCursor { offset: 3, .. })
	));
	assert!(matches!(
		bridge.submit_selection(handle, id, 0..400),
		Err(Error::Editing(lisle_editing::Error::RangeOutOfBounds { .. }))
	));
	assert!(matches!(
		bridge.submit_selection(handle, id, 0..16),
		Err(Error::Repl(lisle_repl::Error::EmptySubmission))
	));
	assert_eq!(bridge.session_state(handle).expect("tracked"), SessionState::Ready);
	bridge.stop_all();
	assert!(matches!(bridge.session(handle), Err(Error::UnknownSession(_))));
}

#[derive(Default)]
struct Transcript {
	lines: Mutex<Vec<String>>,
}

impl ReplView for Transcript {
	fn output(&self, _session: SessionId, event: &ReplOutput) {
		if let ReplOutput::Stdout { text, .. } = event {
			self.lines.lock().push(text.clone());
		}
	}
}

#[tokio::test]
async fn test_start_repl_resolves_project_and_feeds_view() {
	let bridge = bridge();
	let project = StaticConfig::new("/work/app").with("repl.interpreter", "echo-repl");
	let view = Arc::new(Transcript::default());

	let handle = bridge.start_repl(&project, view.clone()).await.expect("starts");
	let session = bridge.session(handle).expect("tracked");
	session.wait_ready(WAIT).await.expect("ready");
	session.evaluate("(+ 1 2)", WAIT).await.expect("answers");

	let pump = async {
		while !view.lines.lock().iter().any(|l| l == "(+ 1 2)\n") {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	};
	tokio::time::timeout(WAIT, pump).await.expect("view receives output");

	assert_eq!(bridge.ensure_session(&project).await.expect("live"), handle);
	bridge.stop(handle).expect("tracked");
	assert_eq!(session.wait_terminated(WAIT).await.expect("ends"), SessionState::Terminated);
}

#[tokio::test]
async fn test_ended_sessions_are_pruned_when_a_new_one_starts() {
	let bridge = bridge();
	let (first, _first_output) = ready_session(&bridge).await;
	bridge.submit(first, "(exit)").expect("ready");
	let session = bridge.session(first).expect("tracked");
	assert_eq!(session.wait_terminated(WAIT).await.expect("exits"), SessionState::Terminated);
	assert_eq!(bridge.session_state(first).expect("still known"), SessionState::Terminated);

	let (second, _second_output) = ready_session(&bridge).await;
	assert!(matches!(bridge.session(first), Err(Error::UnknownSession(id)) if id == first));
	assert_eq!(bridge.session_state(second).expect("tracked"), SessionState::Ready);
	bridge.stop_all();
}

#[tokio::test]
async fn test_start_repl_without_interpreter_is_a_configuration_error() {
	let bridge = bridge();
	let project = StaticConfig::new("/work/app");
	let result = bridge.start_repl(&project, Arc::new(Transcript::default())).await;
	assert!(matches!(result, Err(Error::Repl(lisle_repl::Error::Configuration(_)))));
}
