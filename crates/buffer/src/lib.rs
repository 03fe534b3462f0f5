//! Tracking of live text buffers and their token sequences.
//!
//! The [`TokenizedBufferRegistry`] owns one [`TokenizedBuffer`] per live buffer
//! identity. Edits for one buffer are applied under that buffer's lock, so a
//! buffer is never retokenized concurrently with itself, while different
//! buffers proceed in parallel.
//!
//! Readers never borrow registry state. They take a [`BufferSnapshot`] (text,
//! tokens and the version both belong to) and, before acting on offsets derived
//! from it, check the version is still current. [`TokenizedBufferRegistry::compute`]
//! packages that check-and-retry loop.

mod buffer;
mod registry;

pub use buffer::{BufferSnapshot, TokenizedBuffer};
use lisle_primitives::BufferId;
pub use registry::{
	BufferEvent, BufferEventReceiver, BufferEventSender, DocumentEvents, MAX_COMPUTE_ATTEMPTS,
	TokenizedBufferRegistry,
};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Registry errors.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// No buffer with this identity is being tracked.
	#[error("buffer {0} is not tracked")]
	BufferNotTracked(BufferId),
	/// A buffer with this identity is already being tracked.
	#[error("buffer {0} is already tracked")]
	BufferAlreadyTracked(BufferId),
	/// A result was computed against a version the buffer has since moved past.
	#[error("computed against version {expected} but buffer is at {actual}")]
	TokenizeDesync {
		/// Version the reader observed.
		expected: u64,
		/// Version the buffer is at now.
		actual: u64,
	},
	/// The change set does not fit the buffer text.
	#[error(transparent)]
	Change(#[from] lisle_primitives::Error),
}
