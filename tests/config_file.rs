use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use scroll_accel::config::{load_file, AppConfig, Overrides};
use scroll_accel::ConfigError;

fn write_config(dir: &tempfile::TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
    path
}

#[test]
fn explicit_file_is_loaded_and_overridden() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
exp = 0.8
multiplier = 1.5

[estimator]
idle_window_ms = 300

[evdev]
devices = ["/dev/input/event7"]
"#,
    );

    let file = load_file(Some(&path)).unwrap();
    let cfg = AppConfig::resolve(
        file,
        Overrides {
            multiplier: Some(3.0),
            ..Overrides::default()
        },
    )
    .unwrap();

    assert_eq!(cfg.settings.exp, 0.8);
    assert_eq!(cfg.settings.multiplier, 3.0);
    assert_eq!(cfg.estimator.idle_window, Duration::from_millis(300));
    assert_eq!(cfg.devices, vec![PathBuf::from("/dev/input/event7")]);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_file(Some(&dir.path().join("absent.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn malformed_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "exp = \"fast\"\n");
    let err = load_file(Some(&path)).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
    assert!(err.to_string().contains("config.toml"));
}

#[test]
fn non_positive_exponent_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "exp = -0.5\n");
    let file = load_file(Some(&path)).unwrap();
    let err = AppConfig::resolve(file, Overrides::default()).unwrap_err();
    assert_eq!(err.field(), Some("exp"));
}
