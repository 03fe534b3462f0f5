use super::*;

const PROJECT: &str = r#"
[repl]
interpreter = "/opt/clojure/bin/clojure"
args = ["-J-Xmx1g", "-M:dev"]
startup_timeout_ms = 5000

[repl.env]
JAVA_HOME = "/opt/jdk"
DEBUG = true

[editor]
indent_size = 4
"#;

#[test]
fn test_project_file_dotted_lookup() {
	let project = ProjectFile::parse("/work/app", PROJECT).expect("valid toml");
	assert_eq!(project.root(), Path::new("/work/app"));
	assert_eq!(project.get("repl.interpreter").as_deref(), Some("/opt/clojure/bin/clojure"));
	assert_eq!(project.get("repl.startup_timeout_ms").as_deref(), Some("5000"));
	assert_eq!(project.get("editor.indent_size").as_deref(), Some("4"));
	assert_eq!(project.get("repl.missing"), None);
	assert_eq!(project.get("repl.env"), None);
}

#[test]
fn test_project_file_lists_and_entries() {
	let project = ProjectFile::parse("/work/app", PROJECT).expect("valid toml");
	assert_eq!(
		project.get_list("repl.args"),
		Some(vec!["-J-Xmx1g".to_string(), "-M:dev".to_string()])
	);
	let mut env = project.entries("repl.env");
	env.sort();
	assert_eq!(
		env,
		vec![
			("DEBUG".to_string(), "true".to_string()),
			("JAVA_HOME".to_string(), "/opt/jdk".to_string()),
		]
	);
	assert!(project.entries("nothing.here").is_empty());
}

#[test]
fn test_project_file_rejects_malformed_toml() {
	let err = ProjectFile::parse("/", "[repl\ninterpreter = 1").unwrap_err();
	assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_project_file_missing_is_empty() {
	let dir = tempfile::tempdir().expect("tempdir");
	let project = ProjectFile::load(dir.path()).expect("missing file is fine");
	assert_eq!(project.get("repl.interpreter"), None);
}

#[test]
fn test_project_file_load_from_disk() {
	let dir = tempfile::tempdir().expect("tempdir");
	std::fs::write(dir.path().join(ProjectFile::FILE_NAME), PROJECT).expect("write");
	let project = ProjectFile::load(dir.path()).expect("load");
	assert_eq!(project.get("editor.indent_size").as_deref(), Some("4"));
}

#[test]
fn test_static_config_entries_are_direct_children() {
	let config = StaticConfig::new("/p")
		.with("repl.env.A", "1")
		.with("repl.env.B", "2")
		.with("repl.env.nested.C", "3")
		.with("repl.args", "-i init.clj");
	assert_eq!(
		config.entries("repl.env"),
		vec![("A".to_string(), "1".to_string()), ("B".to_string(), "2".to_string())]
	);
	assert_eq!(
		config.get_list("repl.args"),
		Some(vec!["-i".to_string(), "init.clj".to_string()])
	);
}
