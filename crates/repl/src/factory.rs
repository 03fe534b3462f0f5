//! Session creation and per-project bookkeeping.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use lisle_primitives::ProjectConfig;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{LaunchParameters, ProcessSpawner, ReplOutput, ReplProtocol, ReplSession, Result, SessionId};

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Host-side sink for session output, e.g. a REPL window.
pub trait ReplView: Send + Sync + 'static {
	/// Called once before any output of `session` is shown.
	fn attached(&self, session: SessionId) {
		let _ = session;
	}

	/// Shows one output event. Called in stream order.
	fn output(&self, session: SessionId, event: &ReplOutput);
}

/// Creates sessions for projects and remembers the latest one per project
/// root.
///
/// Starting is serialized per factory, so concurrent [`ensure`](Self::ensure)
/// calls for one project start a single interpreter.
pub struct ReplFactory {
	spawner: Arc<dyn ProcessSpawner>,
	env: EnvLookup,
	sessions: Mutex<FxHashMap<PathBuf, ReplSession>>,
}

impl ReplFactory {
	/// Factory that launches through `spawner` and reads the real environment.
	pub fn new(spawner: Arc<dyn ProcessSpawner>) -> Self {
		Self {
			spawner,
			env: Arc::new(|key| std::env::var(key).ok()),
			sessions: Mutex::new(FxHashMap::default()),
		}
	}

	/// Replaces the environment lookup used to resolve the interpreter.
	pub fn with_env_lookup(mut self, env: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
		self.env = Arc::new(env);
		self
	}

	/// Resolves, creates and starts a new session for `project`.
	///
	/// The new session replaces any earlier one recorded for the project root;
	/// the earlier one keeps running until stopped.
	pub async fn create(&self, project: &dyn ProjectConfig) -> Result<ReplSession> {
		let mut sessions = self.sessions.lock().await;
		self.launch(project, &mut sessions, None).await
	}

	/// Returns the project's live session, starting one if there is none.
	pub async fn ensure(&self, project: &dyn ProjectConfig) -> Result<ReplSession> {
		let mut sessions = self.sessions.lock().await;
		if let Some(session) = sessions.get(project.root())
			&& !session.state().is_terminal()
		{
			debug!(session_id = %session.id(), root = %project.root().display(), "repl.reused");
			return Ok(session.clone());
		}
		self.launch(project, &mut sessions, None).await
	}

	/// Creates a session and pumps its output into `view`, starting with the
	/// interpreter's banner.
	pub async fn start_repl(&self, project: &dyn ProjectConfig, view: Arc<dyn ReplView>) -> Result<ReplSession> {
		let mut sessions = self.sessions.lock().await;
		self.launch(project, &mut sessions, Some(view)).await
	}

	/// Forwards a session's output stream to `view` until the session ends.
	pub fn attach(session: &ReplSession, view: Arc<dyn ReplView>) -> Result<JoinHandle<()>> {
		let mut output = session.take_output()?;
		let id = session.id();
		view.attached(id);
		Ok(tokio::spawn(async move {
			while let Some(event) = output.next().await {
				view.output(id, &event);
			}
			debug!(session_id = %id, "repl.view_detached");
		}))
	}

	/// Latest session recorded for `root`, live or not.
	pub async fn get(&self, root: &Path) -> Option<ReplSession> {
		self.sessions.lock().await.get(root).cloned()
	}

	/// Stops every recorded session.
	pub async fn stop_all(&self) {
		let sessions = self.sessions.lock().await;
		for session in sessions.values() {
			session.stop();
		}
	}

	async fn launch(
		&self,
		project: &dyn ProjectConfig,
		sessions: &mut FxHashMap<PathBuf, ReplSession>,
		view: Option<Arc<dyn ReplView>>,
	) -> Result<ReplSession> {
		let params = LaunchParameters::resolve_with(project, |key| (self.env)(key))?;
		let protocol = ReplProtocol::from_config(project)?;
		let session = ReplSession::new(params, protocol);
		if let Some(view) = view {
			Self::attach(&session, view)?;
		}
		session.start(self.spawner.as_ref()).await?;

		info!(session_id = %session.id(), root = %project.root().display(), "repl.created");
		sessions.insert(project.root().to_path_buf(), session.clone());
		Ok(session)
	}
}

impl std::fmt::Debug for ReplFactory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ReplFactory").finish_non_exhaustive()
	}
}
