use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use lisle_buffer::{BufferEventReceiver, BufferSnapshot, DocumentEvents, TokenizedBufferRegistry};
use lisle_editing::IndentOptions;
use lisle_lexer::Token;
use lisle_primitives::{BufferId, ChangeSet, EditPlan, ProjectConfig};
use lisle_repl::{
	LaunchParameters, OutputStream, ProcessSpawner, ReplFactory, ReplProtocol, ReplSession, ReplView, SessionId,
	SessionState, SubmissionId, operations,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::{Error, Result};

#[cfg(test)]
mod tests;

/// Buffer tracking, structural commands and REPL sessions behind one handle.
///
/// Sessions are addressed by their [`SessionId`]; the bridge keeps the
/// sessions it started so hosts only need to hold the id. An ended session
/// stays reachable until it is stopped or the next session starts.
pub struct EditorBridge {
	buffers: TokenizedBufferRegistry,
	spawner: Arc<dyn ProcessSpawner>,
	repls: ReplFactory,
	sessions: RwLock<FxHashMap<SessionId, ReplSession>>,
	indent: IndentOptions,
}

impl std::fmt::Debug for EditorBridge {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("EditorBridge")
			.field("buffers", &self.buffers)
			.field("sessions", &self.sessions.read().len())
			.field("indent", &self.indent)
			.finish_non_exhaustive()
	}
}

impl EditorBridge {
	/// Creates a bridge that launches interpreters through `spawner`.
	pub fn new(spawner: Arc<dyn ProcessSpawner>) -> Self {
		Self::with_registry(TokenizedBufferRegistry::new(), spawner)
	}

	/// Like [`new`](Self::new), also returning buffer lifecycle events.
	pub fn with_events(spawner: Arc<dyn ProcessSpawner>) -> (Self, BufferEventReceiver) {
		let (registry, events) = TokenizedBufferRegistry::with_events();
		(Self::with_registry(registry, spawner), events)
	}

	fn with_registry(buffers: TokenizedBufferRegistry, spawner: Arc<dyn ProcessSpawner>) -> Self {
		Self {
			buffers,
			repls: ReplFactory::new(Arc::clone(&spawner)),
			spawner,
			sessions: RwLock::new(FxHashMap::default()),
			indent: IndentOptions::default(),
		}
	}

	/// Sets the indentation used by [`compute_indent`](Self::compute_indent) and
	/// [`format`](Self::format).
	pub fn with_indent_options(mut self, indent: IndentOptions) -> Self {
		self.indent = indent;
		self
	}

	/// Reads the `editor.*` options of `project`.
	pub fn with_project_options(self, project: &dyn ProjectConfig) -> Result<Self> {
		Ok(self.with_indent_options(IndentOptions::from_config(project)?))
	}

	/// Replaces the environment lookup used to resolve project interpreters.
	pub fn with_env_lookup(mut self, env: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
		self.repls = ReplFactory::new(Arc::clone(&self.spawner)).with_env_lookup(env);
		self
	}

	/// The buffer registry.
	pub fn buffers(&self) -> &TokenizedBufferRegistry {
		&self.buffers
	}

	/// Current indentation options.
	pub fn indent_options(&self) -> IndentOptions {
		self.indent
	}

	/// Tokens of a tracked buffer at its current version.
	pub fn get_tokens(&self, id: BufferId) -> Result<Arc<Vec<Token>>> {
		Ok(self.buffers.get(id)?.tokens)
	}

	/// Snapshot of a tracked buffer.
	pub fn snapshot(&self, id: BufferId) -> Result<BufferSnapshot> {
		Ok(self.buffers.get(id)?)
	}

	/// Plans commenting out the lines `range` touches.
	pub fn apply_block_comment(&self, id: BufferId, range: Range<usize>) -> Result<EditPlan> {
		Ok(self
			.buffers
			.compute(id, |snapshot| lisle_editing::comment(snapshot, range.clone()))??)
	}

	/// Plans uncommenting the lines `range` touches.
	pub fn apply_block_uncomment(&self, id: BufferId, range: Range<usize>) -> Result<EditPlan> {
		Ok(self
			.buffers
			.compute(id, |snapshot| lisle_editing::uncomment(snapshot, range.clone()))??)
	}

	/// Plans re-indenting one zero-based line.
	pub fn compute_indent(&self, id: BufferId, line: usize) -> Result<EditPlan> {
		let indent = self.indent;
		Ok(self
			.buffers
			.compute(id, |snapshot| lisle_editing::compute_indent(snapshot, line, indent))??)
	}

	/// Plans re-indenting the whole buffer.
	pub fn format(&self, id: BufferId) -> Result<EditPlan> {
		let indent = self.indent;
		Ok(self
			.buffers
			.compute(id, |snapshot| lisle_editing::format_document(snapshot, indent))??)
	}

	/// The top-level form at or before `offset`, with its text.
	pub fn current_form(&self, id: BufferId, offset: usize) -> Result<Option<(Range<usize>, String)>> {
		Ok(self
			.buffers
			.compute(id, |snapshot| lisle_editing::current_form(snapshot, offset))?)
	}

	/// Namespace declared by the buffer's `ns` form.
	pub fn namespace(&self, id: BufferId) -> Result<Option<String>> {
		Ok(lisle_editing::namespace_of(&self.buffers.get(id)?.tokens))
	}

	/// Spawns a session with explicit parameters.
	pub async fn start_session(&self, params: LaunchParameters, protocol: ReplProtocol) -> Result<SessionId> {
		let session = ReplSession::new(params, protocol);
		session.start(self.spawner.as_ref()).await?;
		Ok(self.track(session))
	}

	/// Resolves the project's interpreter and starts a new session whose output
	/// goes to `view`.
	pub async fn start_repl(&self, project: &dyn ProjectConfig, view: Arc<dyn ReplView>) -> Result<SessionId> {
		let session = self.repls.start_repl(project, view).await?;
		Ok(self.track(session))
	}

	/// The project's live session, started on demand.
	pub async fn ensure_session(&self, project: &dyn ProjectConfig) -> Result<SessionId> {
		let session = self.repls.ensure(project).await?;
		Ok(self.track(session))
	}

	/// Records `session` and forgets sessions that have ended since the last
	/// one was recorded.
	fn track(&self, session: ReplSession) -> SessionId {
		let id = session.id();
		info!(session_id = %id, program = %session.params().program(), "bridge.session_tracked");
		let mut sessions = self.sessions.write();
		sessions.retain(|old, s| {
			let ended = s.state().is_terminal();
			if ended {
				debug!(session_id = %old, "bridge.session_pruned");
			}
			!ended
		});
		sessions.insert(id, session);
		id
	}

	/// The session behind `handle`.
	pub fn session(&self, handle: SessionId) -> Result<ReplSession> {
		self.sessions
			.read()
			.get(&handle)
			.cloned()
			.ok_or(Error::UnknownSession(handle))
	}

	/// Current state of a session.
	pub fn session_state(&self, handle: SessionId) -> Result<SessionState> {
		Ok(self.session(handle)?.state())
	}

	/// Sends source text to a session.
	pub fn submit(&self, handle: SessionId, text: &str) -> Result<SubmissionId> {
		Ok(self.session(handle)?.submit(text)?)
	}

	/// Takes the output stream of a session. Each session has one.
	pub fn output(&self, handle: SessionId) -> Result<OutputStream> {
		Ok(self.session(handle)?.take_output()?)
	}

	/// Stops a session and forgets it.
	pub fn stop(&self, handle: SessionId) -> Result<()> {
		let session = self
			.sessions
			.write()
			.remove(&handle)
			.ok_or(Error::UnknownSession(handle))?;
		session.stop();
		Ok(())
	}

	/// Stops every session.
	pub fn stop_all(&self) {
		let sessions: Vec<_> = self.sessions.write().drain().map(|(_, s)| s).collect();
		for session in sessions {
			session.stop();
		}
	}

	/// Submits the top-level form under or before the cursor.
	pub fn submit_current_form(&self, handle: SessionId, buffer: BufferId, offset: usize) -> Result<SubmissionId> {
		let session = self.session(handle)?;
		let (span, text) = self
			.current_form(buffer, offset)?
			.ok_or(Error::NoFormAtCursor { buffer, offset })?;
		debug!(session_id = %handle, buffer_id = %buffer, ?span, "bridge.submit_form");
		Ok(session.submit(&text)?)
	}

	/// Submits the selected text verbatim.
	pub fn submit_selection(&self, handle: SessionId, buffer: BufferId, range: Range<usize>) -> Result<SubmissionId> {
		let session = self.session(handle)?;
		let snapshot = self.buffers.get(buffer)?;
		let text = snapshot
			.text
			.get_byte_slice(range.clone())
			.ok_or(lisle_editing::Error::RangeOutOfBounds {
				start: range.start,
				end: range.end,
				len: snapshot.len_bytes(),
			})?
			.to_string();
		Ok(session.submit(&text)?)
	}

	/// Loads the buffer's file into the session.
	pub fn load_active_file(&self, handle: SessionId, buffer: BufferId) -> Result<SubmissionId> {
		let session = self.session(handle)?;
		let path = self.buffers.path(buffer)?.ok_or(Error::NoPath(buffer))?;
		Ok(operations::load_file(&session, &path)?)
	}

	/// Switches the session to the namespace the buffer declares.
	pub fn switch_to_buffer_namespace(&self, handle: SessionId, buffer: BufferId) -> Result<SubmissionId> {
		let session = self.session(handle)?;
		let namespace = self.namespace(buffer)?.ok_or(Error::NoNamespace(buffer))?;
		Ok(operations::switch_namespace(&session, &namespace)?)
	}
}

impl DocumentEvents for EditorBridge {
	fn document_created(&self, id: BufferId, path: Option<&Path>, text: &str) -> lisle_buffer::Result<()> {
		self.buffers.document_created(id, path, text)
	}

	fn document_disposed(&self, id: BufferId) -> lisle_buffer::Result<()> {
		self.buffers.document_disposed(id)
	}

	fn buffer_changed(&self, id: BufferId, changes: &ChangeSet) -> lisle_buffer::Result<()> {
		self.buffers.buffer_changed(id, changes)
	}

	fn document_renamed(&self, id: BufferId, path: &Path) -> lisle_buffer::Result<()> {
		self.buffers.document_renamed(id, path)
	}
}
