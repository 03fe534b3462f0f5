//! REPL session lifecycle.

mod io;


use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{Error, LaunchParameters, ProcessExit, ProcessSpawner, ReplProtocol, Result};

/// Process-unique session identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl SessionId {
	fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}
}

impl fmt::Display for SessionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "repl#{}", self.0)
	}
}

/// Correlation token of one submission, unique within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubmissionId(pub u64);

impl fmt::Display for SubmissionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
	/// Created, no process yet.
	NotStarted,
	/// Process spawned, waiting for its first prompt.
	Starting,
	/// Waiting for a submission.
	Ready,
	/// Evaluating a submission.
	Busy,
	/// The process failed to launch, crashed or its pipes broke.
	Faulted,
	/// Stopped, or the process exited cleanly.
	Terminated,
}

impl SessionState {
	/// True for the two end states.
	pub fn is_terminal(self) -> bool {
		matches!(self, Self::Faulted | Self::Terminated)
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::NotStarted => "not started",
			Self::Starting => "starting",
			Self::Ready => "ready",
			Self::Busy => "busy",
			Self::Faulted => "faulted",
			Self::Terminated => "terminated",
		})
	}
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
	/// [`ReplSession::stop`] was called.
	Stopped,
	/// The process exited on its own.
	Exited(ProcessExit),
	/// The process could not be spawned.
	LaunchFailed(String),
	/// Reading or writing a pipe failed.
	Io(String),
}

impl fmt::Display for ExitReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Stopped => f.write_str("stopped"),
			Self::Exited(exit) => write!(f, "process exited ({exit})"),
			Self::LaunchFailed(e) => write!(f, "launch failed: {e}"),
			Self::Io(e) => write!(f, "pipe error: {e}"),
		}
	}
}

/// One event on a session's output stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplOutput {
	/// Standard output, attributed to the submission in flight if any.
	Stdout {
		/// Submission being evaluated when the text arrived.
		submission: Option<SubmissionId>,
		/// Output text.
		text: String,
	},
	/// Standard error, attributed like [`ReplOutput::Stdout`].
	Stderr {
		/// Submission being evaluated when the text arrived.
		submission: Option<SubmissionId>,
		/// Output text.
		text: String,
	},
	/// The interpreter answered every form of a submission.
	Completed {
		/// Finished submission.
		submission: SubmissionId,
	},
	/// The session ended. Always the last event, and sent exactly once.
	Terminated {
		/// Final state, [`SessionState::Terminated`] or [`SessionState::Faulted`].
		state: SessionState,
		/// What ended it.
		reason: ExitReason,
	},
}

/// Output collected for one [`ReplSession::evaluate`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
	/// Submission that produced the output.
	pub submission: SubmissionId,
	/// Everything printed to stdout, prompts excluded.
	pub stdout: String,
	/// Everything printed to stderr.
	pub stderr: String,
}

struct Collector {
	stdout: String,
	stderr: String,
	done: oneshot::Sender<Result<Evaluation>>,
}

struct InFlight {
	id: SubmissionId,
	/// Prompts still expected before the submission is complete.
	remaining: usize,
	collector: Option<Collector>,
}

struct Core {
	state: SessionState,
	in_flight: Option<InFlight>,
	next_submission: u64,
	outbound: Option<mpsc::UnboundedSender<String>>,
	/// Why the process died before becoming ready.
	launch_failure: Option<(std::io::ErrorKind, String)>,
}

pub(crate) struct Inner {
	id: SessionId,
	params: LaunchParameters,
	protocol: ReplProtocol,
	core: Mutex<Core>,
	state_tx: watch::Sender<SessionState>,
	/// Present while someone holds the output stream. Events emitted before
	/// the stream is taken are dropped rather than queued.
	output_tx: Mutex<Option<mpsc::UnboundedSender<ReplOutput>>>,
	output_taken: AtomicBool,
	cancel: CancellationToken,
}

impl Inner {
	fn set_state(&self, core: &mut Core, state: SessionState) {
		trace!(session_id = %self.id, from = %core.state, to = %state, "repl.state");
		core.state = state;
		self.state_tx.send_replace(state);
	}

	fn emit(&self, event: ReplOutput) {
		let mut output = self.output_tx.lock();
		if let Some(tx) = output.as_ref()
			&& tx.send(event).is_err()
		{
			*output = None;
		}
	}

	pub(crate) fn on_stdout(&self, text: String) {
		let mut core = self.core.lock();
		let submission = core.in_flight.as_mut().map(|f| {
			if let Some(c) = f.collector.as_mut() {
				c.stdout.push_str(&text);
			}
			f.id
		});
		self.emit(ReplOutput::Stdout { submission, text });
	}

	pub(crate) fn on_stderr(&self, text: String) {
		let mut core = self.core.lock();
		let submission = core.in_flight.as_mut().map(|f| {
			if let Some(c) = f.collector.as_mut() {
				c.stderr.push_str(&text);
			}
			f.id
		});
		self.emit(ReplOutput::Stderr { submission, text });
	}

	pub(crate) fn on_prompt(&self) {
		let mut core = self.core.lock();
		match core.state {
			SessionState::Starting => {
				info!(session_id = %self.id, "repl.ready");
				self.set_state(&mut core, SessionState::Ready);
			}
			SessionState::Busy => {
				let Some(in_flight) = core.in_flight.as_mut() else {
					return;
				};
				in_flight.remaining = in_flight.remaining.saturating_sub(1);
				if in_flight.remaining > 0 {
					return;
				}
				if let Some(done) = core.in_flight.take() {
					debug!(session_id = %self.id, submission = %done.id, "repl.completed");
					self.set_state(&mut core, SessionState::Ready);
					self.emit(ReplOutput::Completed { submission: done.id });
					if let Some(c) = done.collector {
						let _ = c.done.send(Ok(Evaluation {
							submission: done.id,
							stdout: c.stdout,
							stderr: c.stderr,
						}));
					}
				}
			}
			state => trace!(session_id = %self.id, %state, "repl.unexpected_prompt"),
		}
	}

	pub(crate) fn startup_elapsed(&self) {
		let mut core = self.core.lock();
		if core.state == SessionState::Starting {
			warn!(
				session_id = %self.id,
				timeout = ?self.protocol.startup_timeout,
				"repl.no_prompt_before_timeout; assuming ready"
			);
			self.set_state(&mut core, SessionState::Ready);
		}
	}

	/// Moves to a terminal state and emits the single `Terminated` event.
	/// Later calls are ignored.
	pub(crate) fn finish(&self, reason: ExitReason) {
		let mut core = self.core.lock();
		if core.state.is_terminal() {
			return;
		}

		let was_starting = matches!(core.state, SessionState::NotStarted | SessionState::Starting);
		let state = match &reason {
			ExitReason::Stopped => SessionState::Terminated,
			ExitReason::Exited(exit) if exit.success() && !was_starting => SessionState::Terminated,
			_ => SessionState::Faulted,
		};
		if state == SessionState::Faulted && was_starting {
			core.launch_failure = Some(match &reason {
				ExitReason::LaunchFailed(e) => (std::io::ErrorKind::Other, e.clone()),
				other => (std::io::ErrorKind::UnexpectedEof, format!("exited before ready: {other}")),
			});
		}

		core.outbound = None;
		if let Some(in_flight) = core.in_flight.take()
			&& let Some(c) = in_flight.collector
		{
			let _ = c.done.send(Err(Error::SessionTerminated));
		}
		self.set_state(&mut core, state);

		match state {
			SessionState::Faulted => warn!(session_id = %self.id, %reason, "repl.faulted"),
			_ => info!(session_id = %self.id, %reason, "repl.terminated"),
		}
		self.emit(ReplOutput::Terminated { state, reason });
		*self.output_tx.lock() = None;
	}
}

/// Handle to one interpreter process and its protocol state.
///
/// Cheap to clone; all clones drive the same session.
#[derive(Clone)]
pub struct ReplSession {
	inner: Arc<Inner>,
}

impl fmt::Debug for ReplSession {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ReplSession")
			.field("id", &self.inner.id)
			.field("program", &self.inner.params.program())
			.field("state", &self.state())
			.finish()
	}
}

impl ReplSession {
	/// Creates a session in [`SessionState::NotStarted`].
	pub fn new(params: LaunchParameters, protocol: ReplProtocol) -> Self {
		let (state_tx, _) = watch::channel(SessionState::NotStarted);
		Self {
			inner: Arc::new(Inner {
				id: SessionId::next(),
				params,
				protocol,
				core: Mutex::new(Core {
					state: SessionState::NotStarted,
					in_flight: None,
					next_submission: 1,
					outbound: None,
					launch_failure: None,
				}),
				state_tx,
				output_tx: Mutex::new(None),
				output_taken: AtomicBool::new(false),
				cancel: CancellationToken::new(),
			}),
		}
	}

	/// Session identity.
	pub fn id(&self) -> SessionId {
		self.inner.id
	}

	/// Parameters the session was created with.
	pub fn params(&self) -> &LaunchParameters {
		&self.inner.params
	}

	/// Protocol the session frames submissions with.
	pub fn protocol(&self) -> &ReplProtocol {
		&self.inner.protocol
	}

	/// Current state.
	pub fn state(&self) -> SessionState {
		self.inner.core.lock().state
	}

	/// Watches state changes.
	pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
		self.inner.state_tx.subscribe()
	}

	/// Takes the output stream. There is one stream per session.
	///
	/// The stream starts at the moment it is taken; take it before
	/// [`start`](Self::start) to see the interpreter's banner. Taken after the
	/// session ended, it is empty.
	pub fn take_output(&self) -> Result<OutputStream> {
		if self.inner.output_taken.swap(true, Ordering::AcqRel) {
			return Err(Error::OutputTaken);
		}
		let (tx, rx) = mpsc::unbounded_channel();
		// Held so no event can be emitted between the state check and the store.
		let core = self.inner.core.lock();
		if !core.state.is_terminal() {
			*self.inner.output_tx.lock() = Some(tx);
		}
		drop(core);
		Ok(OutputStream { rx, done: false })
	}

	/// Spawns the interpreter and starts pumping its pipes.
	///
	/// Returns once the process is running; use [`wait_ready`](Self::wait_ready)
	/// to wait for its first prompt. A spawn failure leaves the session
	/// [`SessionState::Faulted`].
	pub async fn start(&self, spawner: &dyn ProcessSpawner) -> Result<()> {
		{
			let mut core = self.inner.core.lock();
			if core.state != SessionState::NotStarted {
				return Err(Error::AlreadyStarted);
			}
			self.inner.set_state(&mut core, SessionState::Starting);
		}

		let params = &self.inner.params;
		info!(
			session_id = %self.inner.id,
			program = %params.program(),
			cwd = %params.working_dir.display(),
			"repl.starting"
		);

		let process = match spawner.spawn(params).await {
			Ok(process) => process,
			Err(source) => {
				self.inner.finish(ExitReason::LaunchFailed(source.to_string()));
				return Err(Error::Launch {
					program: params.program(),
					source,
				});
			}
		};

		let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
		{
			let mut core = self.inner.core.lock();
			// A stop that raced the spawn leaves the token cancelled; the I/O task
			// then tears the process down straight away.
			if !core.state.is_terminal() {
				core.outbound = Some(outbound_tx);
			}
		}
		tokio::spawn(io::run_session_io(Arc::clone(&self.inner), process, outbound_rx));
		Ok(())
	}

	/// Sends source text for evaluation.
	///
	/// Fails synchronously unless the session is [`SessionState::Ready`]; in
	/// particular a second submission while one is in flight fails with
	/// [`Error::SessionBusy`] rather than queuing.
	pub fn submit(&self, text: &str) -> Result<SubmissionId> {
		self.submit_inner(text, None)
	}

	/// Submits `text` and collects its output until the interpreter answers.
	///
	/// On timeout the submission stays in flight and the session stays busy.
	pub async fn evaluate(&self, text: &str, timeout: Duration) -> Result<Evaluation> {
		let (done_tx, done_rx) = oneshot::channel();
		self.submit_inner(text, Some(done_tx))?;
		match tokio::time::timeout(timeout, done_rx).await {
			Ok(Ok(result)) => result,
			Ok(Err(_)) => Err(Error::SessionTerminated),
			Err(_) => Err(Error::Timeout {
				operation: "evaluation",
				after: timeout,
			}),
		}
	}

	fn submit_inner(&self, text: &str, done: Option<oneshot::Sender<Result<Evaluation>>>) -> Result<SubmissionId> {
		let mut core = self.inner.core.lock();
		match core.state {
			SessionState::Ready => {}
			SessionState::Busy => return Err(Error::SessionBusy),
			SessionState::Faulted | SessionState::Terminated => return Err(Error::SessionTerminated),
			state => return Err(Error::SessionNotReady(state)),
		}

		let framed = self.inner.protocol.frame(text)?;
		let outbound = core.outbound.clone().ok_or(Error::SessionTerminated)?;
		let id = SubmissionId(core.next_submission);
		outbound.send(framed.text).map_err(|_| Error::SessionTerminated)?;
		core.next_submission += 1;

		debug!(session_id = %self.inner.id, submission = %id, forms = framed.prompts, "repl.submitted");
		core.in_flight = Some(InFlight {
			id,
			remaining: framed.prompts,
			collector: done.map(|done| Collector {
				stdout: String::new(),
				stderr: String::new(),
				done,
			}),
		});
		self.inner.set_state(&mut core, SessionState::Busy);
		Ok(id)
	}

	/// Waits until the session has reached `Ready`.
	///
	/// Fails with [`Error::Launch`] if the process died while starting.
	pub async fn wait_ready(&self, timeout: Duration) -> Result<()> {
		let mut rx = self.subscribe_state();
		let started = rx.wait_for(|s| !matches!(s, SessionState::NotStarted | SessionState::Starting));
		let state = match tokio::time::timeout(timeout, started).await {
			Ok(Ok(state)) => *state,
			Ok(Err(_)) => return Err(Error::SessionTerminated),
			Err(_) => {
				return Err(Error::Timeout {
					operation: "readiness",
					after: timeout,
				});
			}
		};

		match state {
			SessionState::Ready | SessionState::Busy => Ok(()),
			SessionState::Faulted => match self.inner.core.lock().launch_failure.clone() {
				Some((kind, message)) => Err(Error::Launch {
					program: self.inner.params.program(),
					source: std::io::Error::new(kind, message),
				}),
				None => Err(Error::SessionTerminated),
			},
			_ => Err(Error::SessionTerminated),
		}
	}

	/// Waits until the session has ended and returns its final state.
	pub async fn wait_terminated(&self, timeout: Duration) -> Result<SessionState> {
		let mut rx = self.subscribe_state();
		match tokio::time::timeout(timeout, rx.wait_for(|s| s.is_terminal())).await {
			Ok(Ok(state)) => Ok(*state),
			Ok(Err(_)) => Ok(self.state()),
			Err(_) => Err(Error::Timeout {
				operation: "termination",
				after: timeout,
			}),
		}
	}

	/// Stops the session. Safe to call from any state and never blocks.
	///
	/// The interpreter's stdin is closed so it can exit on its own; it is killed
	/// if it has not exited within the protocol's stop timeout.
	pub fn stop(&self) {
		let state = self.state();
		match state {
			SessionState::NotStarted => self.inner.finish(ExitReason::Stopped),
			_ if state.is_terminal() => {}
			_ => {
				debug!(session_id = %self.inner.id, %state, "repl.stop_requested");
				self.inner.cancel.cancel();
			}
		}
	}
}

/// Ordered output of one session. Ends after [`ReplOutput::Terminated`].
#[derive(Debug)]
pub struct OutputStream {
	rx: mpsc::UnboundedReceiver<ReplOutput>,
	done: bool,
}

impl OutputStream {
	/// Receives the next event.
	pub async fn recv(&mut self) -> Option<ReplOutput> {
		futures::StreamExt::next(self).await
	}
}

impl Stream for OutputStream {
	type Item = ReplOutput;

	fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		if self.done {
			return Poll::Ready(None);
		}
		let event = std::task::ready!(self.rx.poll_recv(cx));
		if matches!(event, Some(ReplOutput::Terminated { .. }) | None) {
			self.done = true;
		}
		Poll::Ready(event)
	}
}
