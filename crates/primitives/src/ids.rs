use std::fmt;

/// Stable identity of an editable text buffer.
///
/// Assigned by the host. The identity survives renames, so the registry is keyed
/// by it rather than by path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u64);

impl fmt::Display for BufferId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "buf#{}", self.0)
	}
}

impl From<u64> for BufferId {
	fn from(raw: u64) -> Self {
		Self(raw)
	}
}
