use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lisle_primitives::{BufferId, ChangeSet};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{BufferSnapshot, Error, Result, TokenizedBuffer};


/// How many times [`TokenizedBufferRegistry::compute`] re-reads a buffer that
/// keeps moving before it gives up with [`Error::TokenizeDesync`].
pub const MAX_COMPUTE_ATTEMPTS: usize = 3;

/// Lifecycle notification for a tracked buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEvent {
	/// The buffer started being tracked.
	Tracked {
		/// Buffer identity.
		id: BufferId,
	},
	/// The buffer's tokens were recomputed after an edit.
	Retokenized {
		/// Buffer identity.
		id: BufferId,
		/// Version after the edit.
		version: u64,
		/// Byte range of the new text the edit touched; `None` for an identity edit.
		changed: Option<Range<usize>>,
	},
	/// The buffer stopped being tracked.
	Untracked {
		/// Buffer identity.
		id: BufferId,
	},
}

/// Sender for buffer events.
pub type BufferEventSender = mpsc::UnboundedSender<BufferEvent>;

/// Receiver for buffer events.
pub type BufferEventReceiver = mpsc::UnboundedReceiver<BufferEvent>;

/// Document lifecycle and edit notifications, as delivered by an editor host.
///
/// The host calls these; the implementor holds no reference back into the host.
/// Filtering by language happens on the host side before calling in.
pub trait DocumentEvents: Send + Sync {
	/// A document was opened or created.
	fn document_created(&self, id: BufferId, path: Option<&Path>, text: &str) -> Result<()>;

	/// A document was closed.
	fn document_disposed(&self, id: BufferId) -> Result<()>;

	/// A document's text changed.
	fn buffer_changed(&self, id: BufferId, changes: &ChangeSet) -> Result<()>;

	/// A document was saved under a new path.
	fn document_renamed(&self, id: BufferId, path: &Path) -> Result<()>;
}

type Entry = Arc<Mutex<TokenizedBuffer>>;

/// Owner of every live [`TokenizedBuffer`], keyed by buffer identity.
///
/// The map lock is only held to look up, insert or remove entries. Edits take the
/// per-buffer lock, so buffers are retokenized in parallel with each other but
/// never concurrently with themselves.
pub struct TokenizedBufferRegistry {
	buffers: RwLock<FxHashMap<BufferId, Entry>>,
	event_sender: Option<BufferEventSender>,
}

impl std::fmt::Debug for TokenizedBufferRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TokenizedBufferRegistry")
			.field("buffers", &self.buffers.read().len())
			.field("has_event_sender", &self.event_sender.is_some())
			.finish()
	}
}

impl Default for TokenizedBufferRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl TokenizedBufferRegistry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self {
			buffers: RwLock::new(FxHashMap::default()),
			event_sender: None,
		}
	}

	/// Creates an empty registry that reports lifecycle changes on a channel.
	pub fn with_events() -> (Self, BufferEventReceiver) {
		let (sender, receiver) = mpsc::unbounded_channel();
		let registry = Self {
			buffers: RwLock::new(FxHashMap::default()),
			event_sender: Some(sender),
		};
		(registry, receiver)
	}

	/// Starts tracking a buffer. Fails if `id` is already live.
	pub fn create(&self, id: BufferId, path: Option<PathBuf>, text: &str) -> Result<BufferSnapshot> {
		if self.buffers.read().contains_key(&id) {
			return Err(Error::BufferAlreadyTracked(id));
		}

		// Tokenize outside the map lock; a racing create is caught below.
		let buffer = TokenizedBuffer::new(id, path, text);
		let snapshot = buffer.snapshot();

		let mut buffers = self.buffers.write();
		if buffers.contains_key(&id) {
			return Err(Error::BufferAlreadyTracked(id));
		}
		buffers.insert(id, Arc::new(Mutex::new(buffer)));
		// Emitted under the map lock so no edit event can precede it.
		self.emit(BufferEvent::Tracked { id });
		drop(buffers);

		debug!(buffer_id = %id, bytes = text.len(), tokens = snapshot.tokens.len(), "buffer.tracked");
		Ok(snapshot)
	}

	/// Applies an edit notification and returns the new version.
	pub fn on_edit(&self, id: BufferId, changes: &ChangeSet) -> Result<u64> {
		let entry = self.entry(id)?;
		let mut buffer = entry.lock();
		if buffer.is_disposed() {
			return Err(Error::BufferNotTracked(id));
		}

		let changed = match buffer.apply(changes) {
			Ok(changed) => changed,
			Err(error) => {
				warn!(buffer_id = %id, version = buffer.version(), %error, "buffer.edit_rejected");
				return Err(error);
			}
		};
		let version = buffer.version();
		// Events for one buffer are ordered by its lock.
		self.emit(BufferEvent::Retokenized { id, version, changed });
		Ok(version)
	}

	/// Stops tracking a buffer.
	pub fn remove(&self, id: BufferId) -> Result<()> {
		let entry = self
			.buffers
			.write()
			.remove(&id)
			.ok_or(Error::BufferNotTracked(id))?;
		// Waits for an in-flight edit on this buffer, then fences out later ones
		// that already cloned the entry.
		let mut buffer = entry.lock();
		buffer.dispose();
		self.emit(BufferEvent::Untracked { id });
		drop(buffer);

		debug!(buffer_id = %id, "buffer.untracked");
		Ok(())
	}

	/// Snapshot of the buffer's current text, tokens and version.
	pub fn get(&self, id: BufferId) -> Result<BufferSnapshot> {
		Ok(self.entry(id)?.lock().snapshot())
	}

	/// Current version of a buffer.
	pub fn version(&self, id: BufferId) -> Result<u64> {
		Ok(self.entry(id)?.lock().version())
	}

	/// Path last recorded for a buffer.
	pub fn path(&self, id: BufferId) -> Result<Option<PathBuf>> {
		Ok(self.entry(id)?.lock().path().map(Path::to_path_buf))
	}

	/// Records a new path for a buffer. Tokens are unaffected.
	pub fn rename(&self, id: BufferId, path: PathBuf) -> Result<()> {
		let entry = self.entry(id)?;
		debug!(buffer_id = %id, path = %path.display(), "buffer.renamed");
		entry.lock().set_path(path);
		Ok(())
	}

	/// Fails with [`Error::TokenizeDesync`] unless the buffer is still at `expected`.
	pub fn check_version(&self, id: BufferId, expected: u64) -> Result<()> {
		let actual = self.version(id)?;
		if actual == expected {
			Ok(())
		} else {
			Err(Error::TokenizeDesync { expected, actual })
		}
	}

	/// Runs `f` against a snapshot and returns its result only if the buffer did
	/// not move while `f` ran.
	///
	/// A stale result is discarded and `f` is re-run against the new snapshot, up
	/// to [`MAX_COMPUTE_ATTEMPTS`] times.
	pub fn compute<T>(&self, id: BufferId, mut f: impl FnMut(&BufferSnapshot) -> T) -> Result<T> {
		let mut last = None;
		for attempt in 1..=MAX_COMPUTE_ATTEMPTS {
			let snapshot = self.get(id)?;
			let out = f(&snapshot);
			match self.check_version(id, snapshot.version) {
				Ok(()) => return Ok(out),
				Err(Error::TokenizeDesync { expected, actual }) => {
					debug!(buffer_id = %id, attempt, expected, actual, "buffer.compute_stale");
					last = Some((expected, actual));
				}
				Err(error) => return Err(error),
			}
		}

		let (expected, actual) = last.unwrap_or_default();
		warn!(buffer_id = %id, expected, actual, "buffer.compute_gave_up");
		Err(Error::TokenizeDesync { expected, actual })
	}

	/// Returns true if `id` is live.
	pub fn contains(&self, id: BufferId) -> bool {
		self.buffers.read().contains_key(&id)
	}

	/// Number of live buffers.
	pub fn len(&self) -> usize {
		self.buffers.read().len()
	}

	/// Returns true if no buffer is tracked.
	pub fn is_empty(&self) -> bool {
		self.buffers.read().is_empty()
	}

	/// Identities of all live buffers, in ascending order.
	pub fn ids(&self) -> Vec<BufferId> {
		let mut ids: Vec<_> = self.buffers.read().keys().copied().collect();
		ids.sort_unstable();
		ids
	}

	fn entry(&self, id: BufferId) -> Result<Entry> {
		self.buffers
			.read()
			.get(&id)
			.cloned()
			.ok_or(Error::BufferNotTracked(id))
	}

	fn emit(&self, event: BufferEvent) {
		if let Some(ref sender) = self.event_sender {
			let _ = sender.send(event);
		}
	}
}

impl DocumentEvents for TokenizedBufferRegistry {
	fn document_created(&self, id: BufferId, path: Option<&Path>, text: &str) -> Result<()> {
		self.create(id, path.map(Path::to_path_buf), text).map(drop)
	}

	fn document_disposed(&self, id: BufferId) -> Result<()> {
		self.remove(id)
	}

	fn buffer_changed(&self, id: BufferId, changes: &ChangeSet) -> Result<()> {
		self.on_edit(id, changes).map(drop)
	}

	fn document_renamed(&self, id: BufferId, path: &Path) -> Result<()> {
		self.rename(id, path.to_path_buf())
	}
}
