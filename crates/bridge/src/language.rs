use std::path::Path;

/// File extensions the host should route to the bridge.
pub const TRACKED_EXTENSIONS: &[&str] = &["clj", "cljs", "cljc", "edn"];

/// Returns true if `path` names a source file the bridge understands.
///
/// The bridge never filters on its own; hosts call this before forwarding
/// document events.
pub fn is_tracked_language(path: &Path) -> bool {
	path.extension()
		.and_then(|ext| ext.to_str())
		.is_some_and(|ext| TRACKED_EXTENSIONS.iter().any(|t| t.eq_ignore_ascii_case(ext)))
}
