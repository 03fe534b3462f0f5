use std::path::{Path, PathBuf};

use lisle_primitives::ProjectConfig;

use crate::{Error, Result};

/// Environment variable consulted when the project names no interpreter.
pub const INTERPRETER_ENV: &str = "LISLE_INTERPRETER";

/// Everything needed to spawn one interpreter process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParameters {
	/// Interpreter executable.
	pub interpreter: PathBuf,
	/// Working directory of the process.
	pub working_dir: PathBuf,
	/// Extra command line arguments.
	pub args: Vec<String>,
	/// Variables added to the inherited environment.
	pub env: Vec<(String, String)>,
}

impl LaunchParameters {
	/// Parameters for `interpreter` run in `working_dir` with no extras.
	pub fn new(interpreter: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
		Self {
			interpreter: interpreter.into(),
			working_dir: working_dir.into(),
			args: Vec::new(),
			env: Vec::new(),
		}
	}

	/// Appends command line arguments.
	pub fn with_args<I, S>(mut self, args: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.args.extend(args.into_iter().map(Into::into));
		self
	}

	/// Adds one environment variable.
	pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env.push((key.into(), value.into()));
		self
	}

	/// Resolves parameters from project configuration and the process
	/// environment.
	///
	/// The interpreter comes from `repl.interpreter`, else from
	/// [`INTERPRETER_ENV`]. There is no further fallback.
	pub fn resolve(project: &dyn ProjectConfig) -> Result<Self> {
		Self::resolve_with(project, |key| std::env::var(key).ok())
	}

	/// [`resolve`](Self::resolve) with an explicit environment lookup.
	pub fn resolve_with(project: &dyn ProjectConfig, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
		let interpreter = non_empty(project.get("repl.interpreter"))
			.or_else(|| non_empty(env(INTERPRETER_ENV)))
			.ok_or_else(|| {
				Error::Configuration(format!(
					"no interpreter configured for {}; set repl.interpreter or {INTERPRETER_ENV}",
					project.root().display()
				))
			})?;

		let root = project.root();
		let working_dir = match non_empty(project.get("repl.working_dir")) {
			Some(dir) => relative_to(root, dir),
			None => root.to_path_buf(),
		};

		let mut env = project.entries("repl.env");
		env.sort();

		Ok(Self {
			interpreter: PathBuf::from(interpreter),
			working_dir,
			args: project.get_list("repl.args").unwrap_or_default(),
			env,
		})
	}

	/// Interpreter path for messages.
	pub fn program(&self) -> String {
		self.interpreter.display().to_string()
	}
}

fn non_empty(value: Option<String>) -> Option<String> {
	value.filter(|v| !v.trim().is_empty())
}

fn relative_to(root: &Path, dir: String) -> PathBuf {
	let dir = PathBuf::from(dir);
	if dir.is_absolute() { dir } else { root.join(dir) }
}
