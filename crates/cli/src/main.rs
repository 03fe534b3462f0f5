//! `lisle` command line host.
//!
//! Drives the editor bridge the way an editor would: the file is opened as a
//! tracked buffer, commands produce edit plans, and the plans are applied and
//! reported back before the result is printed.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::debug;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "lisle")]
#[command(about = "Tokenize, format and evaluate Clojure sources")]
struct Args {
	/// Project root holding `lisle.toml` (defaults to the current directory)
	#[arg(short, long, value_name = "DIR", global = true)]
	project: Option<PathBuf>,

	/// Verbose logging
	#[arg(short, long, global = true)]
	verbose: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Print the tokens of a file, one per line
	Tokenize {
		/// Source file
		file: PathBuf,
	},
	/// Re-indent every line of a file
	Format {
		/// Source file
		file: PathBuf,
		/// Write the result back instead of printing it
		#[arg(short, long)]
		write: bool,
	},
	/// Re-indent one line and print the file
	Indent {
		/// Source file
		file: PathBuf,
		/// One-based line number
		line: usize,
	},
	/// Comment out a range of lines and print the file
	Comment {
		/// Source file
		file: PathBuf,
		/// First one-based line
		start: usize,
		/// Last one-based line, inclusive
		end: usize,
	},
	/// Uncomment a range of lines and print the file
	Uncomment {
		/// Source file
		file: PathBuf,
		/// First one-based line
		start: usize,
		/// Last one-based line, inclusive
		end: usize,
	},
	/// Start the project's REPL
	Repl {
		/// Forms to evaluate before exiting; reads stdin when absent
		#[arg(short, long, value_name = "FORM")]
		eval: Vec<String>,
	},
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	setup_tracing(args.verbose);

	let root = match args.project {
		Some(root) => root,
		None => std::env::current_dir()?,
	};
	debug!(root = %root.display(), command = ?args.command, "lisle.start");
	let project = lisle_primitives::ProjectFile::load(&root)?;

	match args.command {
		Command::Tokenize { file } => commands::tokenize(&project, &file),
		Command::Format { file, write } => commands::format(&project, &file, write),
		Command::Indent { file, line } => commands::indent(&project, &file, line),
		Command::Comment { file, start, end } => commands::toggle_comment(&project, &file, start, end, true),
		Command::Uncomment { file, start, end } => commands::toggle_comment(&project, &file, start, end, false),
		Command::Repl { eval } => commands::repl(&project, eval).await,
	}
}

fn setup_tracing(verbose: bool) {
	use std::fs::OpenOptions;

	use tracing_subscriber::EnvFilter;
	use tracing_subscriber::fmt::format::FmtSpan;
	use tracing_subscriber::prelude::*;

	let filter = || {
		EnvFilter::try_from_env("LISLE_LOG")
			.or_else(|_| EnvFilter::try_from_default_env())
			.unwrap_or_else(|_| {
				if verbose {
					EnvFilter::new("lisle=debug,lisle_repl=debug,lisle_bridge=debug,warn")
				} else {
					EnvFilter::new("warn")
				}
			})
	};

	if let Some(log_dir) = std::env::var("LISLE_LOG_DIR").ok().map(PathBuf::from)
		&& std::fs::create_dir_all(&log_dir).is_ok()
	{
		let log_path = log_dir.join(format!("lisle.{}.log", std::process::id()));

		if let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_path) {
			let file_layer = tracing_subscriber::fmt::layer()
				.with_writer(file)
				.with_ansi(false)
				.with_span_events(FmtSpan::CLOSE)
				.with_target(true);

			tracing_subscriber::registry().with(filter()).with(file_layer).init();

			tracing::info!(path = ?log_path, "lisle tracing initialized");
			return;
		}
	}

	tracing_subscriber::fmt()
		.with_env_filter(filter())
		.with_writer(std::io::stderr)
		.init();
}
