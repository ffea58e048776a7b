use std::io::Write;

use riskgraph::{GraphError, PaginationPolicy, RiskgraphConfig};

#[test]
fn loads_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[store]
db_name = "audit"
namespace = "6ba7b811-9dad-11d1-80b4-00c04fd430c8"

[pagination]
policy = "exact"
max_first = 50

[validation]
max_text_len = 256
"#
    )
    .unwrap();

    let config = RiskgraphConfig::from_file(file.path()).unwrap();
    assert_eq!(config.store.db_name, "audit");
    assert_eq!(config.store.namespace.to_string(), "6ba7b811-9dad-11d1-80b4-00c04fd430c8");
    assert_eq!(config.pagination.policy, PaginationPolicy::Exact);
    assert_eq!(config.pagination.max_first, 50);
    assert_eq!(config.validation.max_text_len, 256);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn missing_file_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = RiskgraphConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, GraphError::Config { .. }));
    assert_eq!(err.kind(), "ConfigError");
}

#[test]
fn malformed_file_is_config_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[store\ndb_name = ").unwrap();
    let err = RiskgraphConfig::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("invalid TOML"));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[pagination]\nmax_first = 10\ndefault_first = 20").unwrap();
    let err = RiskgraphConfig::from_file(file.path()).unwrap_err();
    assert!(err.to_string().contains("default_first"));
}
