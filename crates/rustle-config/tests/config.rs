use std::io::Write;

use pretty_assertions::assert_eq;
use rustle_config::{ConfigError, LoggingConfig, MoveConfig, RefactorConfig, RustleConfig};

#[test]
fn empty_config_uses_defaults() {
    let config = RustleConfig::load_from_str("").unwrap();
    assert_eq!(config, RustleConfig::default());
    assert!(config.refactor.move_items.allow_public_api_changes);
    assert!(config.refactor.move_items.keep_existing_style);
    assert!(!config.refactor.move_items.make_public_within_crate);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn move_section_overrides_individual_fields() {
    let config = RustleConfig::load_from_str(
        r#"
[logging]
level = "debug"
json = true

[refactor.move]
make_public_within_crate = true
optimize_imports = false
"#,
    )
    .unwrap();

    assert_eq!(
        config,
        RustleConfig {
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: true,
            },
            refactor: RefactorConfig {
                move_items: MoveConfig {
                    allow_public_api_changes: true,
                    make_public_within_crate: true,
                    keep_existing_style: true,
                    optimize_imports: false,
                },
            },
        }
    );
}

#[test]
fn unknown_keys_are_rejected() {
    let err = RustleConfig::load_from_str("[refactor.move]\nkeep_style = true\n").unwrap_err();
    match err {
        ConfigError::Toml(message) => assert!(message.contains("unknown field"), "{message}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn loads_from_a_file_and_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rustle.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "[refactor.move]\nallow_public_api_changes = false").unwrap();
    drop(file);

    let config = RustleConfig::load_from_path(&path).unwrap();
    assert!(!config.refactor.move_items.allow_public_api_changes);

    let missing = dir.path().join("missing.toml");
    let err = RustleConfig::load_from_path(&missing).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("missing.toml"));
}
