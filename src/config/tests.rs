use std::io::Write;

use keystone_index::Lang;
use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 9] = [
    "KEYSTONE_CONFIG",
    "KEYSTONE_EMBEDDING_PROVIDER",
    "KEYSTONE_EMBEDDING_BASE_URL",
    "KEYSTONE_EMBEDDING_MODEL",
    "KEYSTONE_QDRANT_URL",
    "KEYSTONE_COLLECTION",
    "KEYSTONE_BATCH_SIZE",
    "KEYSTONE_TOP_K",
    "KEYSTONE_MAX_ATTEMPTS",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("keystone.toml");
    let mut f = std::fs::File::create(&path).unwrap();
    write!(f, "{body}").unwrap();
    path
}

#[test]
fn defaults_when_file_missing() {
    let config = Config::default();
    assert_eq!(config.embedding.provider, "ollama");
    assert_eq!(config.embedding.base_url, "http://localhost:11434");
    assert_eq!(config.store.qdrant_url, "http://localhost:6334");
    assert_eq!(config.walker.batch_size, 1000);
    assert!(config.walker.excluded_dirs.iter().any(|d| d == "node_modules"));
    assert!(config.walker.excluded_extensions.is_empty());
    assert_eq!(config.walker.max_unit_size, 1500);
    assert_eq!(config.indexer.max_attempts, 3);
    assert_eq!(config.indexer.retry_base_delay_ms, 1000);
    assert_eq!(config.indexer.write_pause_ms, 500);
    assert_eq!(config.retrieval.top_k, 15);
    assert_eq!(config.retrieval.keyword_limit, 5);
    assert_eq!(config.retrieval.min_keyword_len, 4);
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn load_missing_file_uses_defaults() {
    clear_env();
    let dir = tempfile::tempdir().unwrap();
    let config = Config::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.store.collection, "legacy_code");
}

#[test]
#[serial]
fn parse_valid_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[embedding]
model = "mxbai-embed-large"

[store]
collection = "billing"

[walker]
batch_size = 250
excluded_dirs = ["out"]
excluded_extensions = ["log", ".bak"]
max_unit_size = 800

[walker.language_overrides]
inc = "cobol"
h = "proc"

[indexer]
retry_base_delay_ms = 10

[retrieval]
top_k = 8
"#,
    );

    clear_env();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.embedding.provider, "ollama");
    assert_eq!(config.embedding.model, "mxbai-embed-large");
    assert_eq!(config.store.collection, "billing");
    assert_eq!(config.walker.batch_size, 250);
    assert_eq!(config.walker.excluded_dirs, vec!["out"]);
    assert_eq!(config.walker.language_overrides["inc"], Lang::Cobol);
    assert_eq!(config.walker.language_overrides["h"], Lang::ProC);
    assert_eq!(config.indexer.max_attempts, 3);
    assert_eq!(config.retrieval.top_k, 8);

    let walker = config.walker.to_walker_config();
    assert_eq!(walker.batch_size, 250);
    assert_eq!(walker.chunker.max_unit_size, 800);
    assert_eq!(walker.excluded_extensions, vec!["log", ".bak"]);

    let indexer = config.indexer.to_indexer_config();
    assert_eq!(indexer.retry_base_delay, std::time::Duration::from_millis(10));
    assert_eq!(indexer.write_pause, std::time::Duration::from_millis(500));
}

#[test]
#[serial]
fn invalid_toml_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[walker]\nbatch_size = \"many\"\n");
    clear_env();
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("failed to parse config file"));
}

#[test]
#[serial]
fn unknown_language_override_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[walker.language_overrides]\ninc = \"fortran\"\n");
    clear_env();
    assert!(Config::load(&path).is_err());
}

#[test]
#[serial]
fn env_overrides_strings() {
    clear_env();
    unsafe {
        std::env::set_var("KEYSTONE_EMBEDDING_BASE_URL", "http://ollama:11434");
        std::env::set_var("KEYSTONE_EMBEDDING_MODEL", "all-minilm");
        std::env::set_var("KEYSTONE_QDRANT_URL", "http://qdrant:6334");
        std::env::set_var("KEYSTONE_COLLECTION", "claims");
    }

    let mut config = Config::default();
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.embedding.base_url, "http://ollama:11434");
    assert_eq!(config.embedding.model, "all-minilm");
    assert_eq!(config.store.qdrant_url, "http://qdrant:6334");
    assert_eq!(config.store.collection, "claims");
}

#[test]
#[serial]
fn env_overrides_numbers() {
    clear_env();
    unsafe {
        std::env::set_var("KEYSTONE_BATCH_SIZE", "64");
        std::env::set_var("KEYSTONE_TOP_K", "3");
        std::env::set_var("KEYSTONE_MAX_ATTEMPTS", "5");
    }

    let mut config = Config::default();
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.walker.batch_size, 64);
    assert_eq!(config.retrieval.top_k, 3);
    assert_eq!(config.indexer.max_attempts, 5);
}

#[test]
#[serial]
fn env_invalid_numbers_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("KEYSTONE_BATCH_SIZE", "lots");
        std::env::set_var("KEYSTONE_TOP_K", "-1");
    }

    let mut config = Config::default();
    config.apply_env_overrides();
    clear_env();

    assert_eq!(config.walker.batch_size, 1000);
    assert_eq!(config.retrieval.top_k, 15);
}

#[derive(Clone, Default)]
struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
#[serial]
fn env_invalid_max_attempts_is_ignored_with_warning() {
    clear_env();
    unsafe { std::env::set_var("KEYSTONE_MAX_ATTEMPTS", "three") };

    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let mut config = Config::default();
    tracing::subscriber::with_default(subscriber, || config.apply_env_overrides());
    clear_env();

    assert_eq!(config.indexer.max_attempts, 3);
    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("WARN"));
    assert!(output.contains("KEYSTONE_MAX_ATTEMPTS"));
    assert!(output.contains("three"));
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[store]\ncollection = \"from_file\"\n");
    clear_env();
    unsafe { std::env::set_var("KEYSTONE_COLLECTION", "from_env") };

    let config = Config::load(&path).unwrap();
    clear_env();

    assert_eq!(config.store.collection, "from_env");
}

#[test]
fn validate_rejects_zero_batch_size() {
    let mut config = Config::default();
    config.walker.batch_size = 0;
    assert!(config.validate().unwrap_err().to_string().contains("batch_size"));
}

#[test]
fn validate_rejects_zero_attempts_and_top_k() {
    let mut config = Config::default();
    config.indexer.max_attempts = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.retrieval.top_k = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_blank_collection() {
    let mut config = Config::default();
    config.store.collection = "  ".into();
    assert!(config.validate().unwrap_err().to_string().contains("collection"));
}

#[test]
#[serial]
fn config_path_resolution_order() {
    clear_env();
    assert_eq!(
        resolve_config_path(Some(Path::new("custom.toml"))),
        PathBuf::from("custom.toml")
    );
    assert_eq!(resolve_config_path(None), PathBuf::from("config/default.toml"));

    unsafe { std::env::set_var("KEYSTONE_CONFIG", "/etc/keystone.toml") };
    assert_eq!(resolve_config_path(None), PathBuf::from("/etc/keystone.toml"));
    assert_eq!(
        resolve_config_path(Some(Path::new("cli.toml"))),
        PathBuf::from("cli.toml")
    );
    clear_env();
}
