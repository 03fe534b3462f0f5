//! Read-only project configuration.
//!
//! The host owns the project model; the core only needs key/value lookups.
//! Keys are dotted paths (`repl.interpreter`). [`ProjectFile`] backs the
//! accessor with a `lisle.toml` file at the project root, and [`StaticConfig`]
//! with an in-memory map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

#[cfg(test)]
mod tests;

/// Read-only key/value view of a project's configuration.
pub trait ProjectConfig: Send + Sync {
	/// Root directory of the project.
	fn root(&self) -> &Path;

	/// Looks up a scalar value by dotted key.
	fn get(&self, key: &str) -> Option<String>;

	/// Looks up a list value. The default splits the scalar on whitespace.
	fn get_list(&self, key: &str) -> Option<Vec<String>> {
		self.get(key)
			.map(|value| value.split_whitespace().map(str::to_owned).collect())
	}

	/// Returns every `(name, value)` pair directly below `prefix`.
	fn entries(&self, prefix: &str) -> Vec<(String, String)>;
}

/// Project configuration loaded from a `lisle.toml` file.
#[derive(Debug, Clone)]
pub struct ProjectFile {
	root: PathBuf,
	table: toml::Table,
}

impl ProjectFile {
	/// Name of the project file looked up at the project root.
	pub const FILE_NAME: &'static str = "lisle.toml";

	/// Loads `<root>/lisle.toml`. A missing file yields an empty configuration.
	pub fn load(root: impl Into<PathBuf>) -> Result<Self> {
		let root = root.into();
		let path = root.join(Self::FILE_NAME);
		let source = match std::fs::read_to_string(&path) {
			Ok(source) => source,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
			Err(e) => return Err(Error::Config(format!("{}: {e}", path.display()))),
		};
		Self::parse(root, &source)
	}

	/// Parses project configuration from TOML source.
	pub fn parse(root: impl Into<PathBuf>, source: &str) -> Result<Self> {
		let table: toml::Table = toml::from_str(source).map_err(|e| Error::Config(e.to_string()))?;
		Ok(Self { root: root.into(), table })
	}

	fn lookup(&self, key: &str) -> Option<&toml::Value> {
		let mut parts = key.split('.');
		let mut value = self.table.get(parts.next()?)?;
		for part in parts {
			value = value.as_table()?.get(part)?;
		}
		Some(value)
	}
}

fn scalar(value: &toml::Value) -> Option<String> {
	match value {
		toml::Value::String(s) => Some(s.clone()),
		toml::Value::Integer(i) => Some(i.to_string()),
		toml::Value::Float(f) => Some(f.to_string()),
		toml::Value::Boolean(b) => Some(b.to_string()),
		toml::Value::Datetime(d) => Some(d.to_string()),
		toml::Value::Array(_) | toml::Value::Table(_) => None,
	}
}

impl ProjectConfig for ProjectFile {
	fn root(&self) -> &Path {
		&self.root
	}

	fn get(&self, key: &str) -> Option<String> {
		self.lookup(key).and_then(scalar)
	}

	fn get_list(&self, key: &str) -> Option<Vec<String>> {
		match self.lookup(key)? {
			toml::Value::Array(items) => Some(items.iter().filter_map(scalar).collect()),
			other => scalar(other).map(|s| s.split_whitespace().map(str::to_owned).collect()),
		}
	}

	fn entries(&self, prefix: &str) -> Vec<(String, String)> {
		let Some(table) = self.lookup(prefix).and_then(toml::Value::as_table) else {
			return Vec::new();
		};
		table
			.iter()
			.filter_map(|(name, value)| scalar(value).map(|v| (name.clone(), v)))
			.collect()
	}
}

/// In-memory project configuration keyed by dotted paths.
#[derive(Debug, Clone, Default)]
pub struct StaticConfig {
	root: PathBuf,
	values: BTreeMap<String, String>,
}

impl StaticConfig {
	/// Creates an empty configuration rooted at `root`.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self {
			root: root.into(),
			values: BTreeMap::new(),
		}
	}

	/// Sets `key` to `value`.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.values.insert(key.into(), value.into());
		self
	}
}

impl ProjectConfig for StaticConfig {
	fn root(&self) -> &Path {
		&self.root
	}

	fn get(&self, key: &str) -> Option<String> {
		self.values.get(key).cloned()
	}

	fn entries(&self, prefix: &str) -> Vec<(String, String)> {
		let prefix = format!("{prefix}.");
		self.values
			.iter()
			.filter_map(|(key, value)| {
				let name = key.strip_prefix(&prefix)?;
				(!name.contains('.')).then(|| (name.to_owned(), value.clone()))
			})
			.collect()
	}
}
