use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

use super::{ExitReason, Inner};
use crate::protocol::Segment;
use crate::{ProcessControl, SpawnedProcess};

const READ_CHUNK: usize = 8192;

/// Runs the I/O loop for a single interpreter process.
///
/// Writes submissions in order, splits stdout into text and prompts, forwards
/// stderr, and ends the session exactly once when the process goes away or
/// the session is stopped.
///
/// Stdin is fed by its own future so a write the interpreter never reads does
/// not stall the pipes or a stop.
pub(super) async fn run_session_io(
	inner: Arc<Inner>,
	process: SpawnedProcess,
	outbound_rx: mpsc::UnboundedReceiver<String>,
) {
	let SpawnedProcess {
		stdin,
		mut stdout,
		mut stderr,
		mut control,
	} = process;
	let id = inner.id;
	let mut writer: Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>> =
		Box::pin(feed_stdin(stdin, outbound_rx));
	let mut writer_open = true;
	let mut scanner = inner.protocol.scanner();
	let mut out_text = Utf8Carry::default();
	let mut err_text = Utf8Carry::default();
	let mut out_buf = vec![0u8; READ_CHUNK];
	let mut err_buf = vec![0u8; READ_CHUNK];
	let mut stdout_open = true;
	let mut stderr_open = true;
	let mut awaiting_startup = true;

	let startup = sleep(inner.protocol.startup_timeout);
	tokio::pin!(startup);

	let reason = loop {
		tokio::select! {
			biased;

			_ = inner.cancel.cancelled() => {
				// Dropping the writer closes stdin, even mid-write.
				drop(writer);
				shutdown(&inner, control.as_mut()).await;
				break ExitReason::Stopped;
			}

			written = &mut writer, if writer_open => {
				writer_open = false;
				if let Err(e) = written {
					tracing::error!(session_id = %id, error = %e, "repl.write_failed");
					let _ = timeout(inner.protocol.stop_timeout, control.kill()).await;
					break ExitReason::Io(e.to_string());
				}
			}

			read = stdout.read(&mut out_buf), if stdout_open => match read {
				Ok(0) => {
					stdout_open = false;
					let mut rest = out_text.finish().unwrap_or_default();
					if let Some(partial) = scanner.flush() {
						rest.insert_str(0, &partial);
					}
					if !rest.is_empty() {
						inner.on_stdout(rest);
					}
				}
				Ok(n) => {
					for segment in scanner.feed(&out_text.decode(&out_buf[..n])) {
						match segment {
							Segment::Text(text) => inner.on_stdout(text),
							Segment::Prompt => inner.on_prompt(),
						}
					}
				}
				Err(e) => {
					tracing::error!(session_id = %id, error = %e, "repl.stdout_failed");
					let _ = timeout(inner.protocol.stop_timeout, control.kill()).await;
					break ExitReason::Io(e.to_string());
				}
			},

			read = stderr.read(&mut err_buf), if stderr_open => match read {
				Ok(0) => {
					stderr_open = false;
					if let Some(rest) = err_text.finish() {
						inner.on_stderr(rest);
					}
				}
				Ok(n) => {
					let text = err_text.decode(&err_buf[..n]);
					if !text.is_empty() {
						inner.on_stderr(text);
					}
				}
				Err(e) => {
					tracing::warn!(session_id = %id, error = %e, "repl.stderr_failed");
					stderr_open = false;
				}
			},

			_ = &mut startup, if awaiting_startup => {
				awaiting_startup = false;
				inner.startup_elapsed();
			}

			exit = control.wait(), if !stdout_open && !stderr_open => {
				break match exit {
					Ok(exit) => {
						tracing::info!(session_id = %id, %exit, "repl.process_exited");
						ExitReason::Exited(exit)
					}
					Err(e) => ExitReason::Io(e.to_string()),
				};
			}
		}
	};

	inner.finish(reason);
}

/// Gives the interpreter, whose stdin is already closed, the stop timeout to
/// exit by itself, then kills it.
async fn shutdown(inner: &Inner, control: &mut dyn ProcessControl) {
	let grace = inner.protocol.stop_timeout;
	match timeout(grace, control.wait()).await {
		Ok(Ok(exit)) => tracing::debug!(session_id = %inner.id, %exit, "repl.exited_on_stop"),
		Ok(Err(e)) => tracing::warn!(session_id = %inner.id, error = %e, "repl.wait_failed"),
		Err(_) => {
			tracing::warn!(session_id = %inner.id, ?grace, "repl.killing");
			match timeout(grace, control.kill()).await {
				Ok(Ok(())) => {}
				Ok(Err(e)) => tracing::warn!(session_id = %inner.id, error = %e, "repl.kill_failed"),
				Err(_) => tracing::warn!(session_id = %inner.id, "repl.kill_timed_out"),
			}
		}
	}
}

/// Writes submissions to stdin until the session drops its sender.
async fn feed_stdin(
	mut stdin: Box<dyn AsyncWrite + Send + Unpin>,
	mut outbound_rx: mpsc::UnboundedReceiver<String>,
) -> std::io::Result<()> {
	while let Some(text) = outbound_rx.recv().await {
		stdin.write_all(text.as_bytes()).await?;
		stdin.flush().await?;
	}
	Ok(())
}

/// Decodes UTF-8 from arbitrary chunk boundaries.
#[derive(Debug, Default)]
struct Utf8Carry {
	carry: Vec<u8>,
}

impl Utf8Carry {
	fn decode(&mut self, bytes: &[u8]) -> String {
		self.carry.extend_from_slice(bytes);
		match std::str::from_utf8(&self.carry) {
			Ok(text) => {
				let text = text.to_owned();
				self.carry.clear();
				text
			}
			// Only an incomplete trailing sequence: keep it for the next chunk.
			Err(e) if e.error_len().is_none() => {
				let valid = e.valid_up_to();
				let text = String::from_utf8_lossy(&self.carry[..valid]).into_owned();
				self.carry.drain(..valid);
				text
			}
			Err(_) => String::from_utf8_lossy(&std::mem::take(&mut self.carry)).into_owned(),
		}
	}

	fn finish(&mut self) -> Option<String> {
		(!self.carry.is_empty()).then(|| String::from_utf8_lossy(&std::mem::take(&mut self.carry)).into_owned())
	}
}
