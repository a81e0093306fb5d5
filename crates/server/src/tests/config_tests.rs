use std::{collections::HashMap, fs};

use super::*;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| vars.get(key).cloned()
}

#[test]
fn defaults_apply_without_file_or_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let settings = load_settings_from(&dir.path().join("server.toml"), env_from(&[]));
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.server_bind, "127.0.0.1:5000");
    assert_eq!(settings.max_upload_bytes, 16 * 1024 * 1024);
    assert_eq!(settings.classifier_url, None);
}

#[test]
fn file_values_are_overridden_by_env() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("server.toml");
    fs::write(
        &path,
        r#"
bind_addr = "0.0.0.0:8080"
upload_dir = "/srv/uploads"
data_dir = "/srv/data"
classifier_url = "http://model.local/classify"
max_upload_bytes = 1048576
"#,
    )
    .expect("write config");

    let from_file = load_settings_from(&path, env_from(&[]));
    assert_eq!(from_file.server_bind, "0.0.0.0:8080");
    assert_eq!(from_file.upload_dir, PathBuf::from("/srv/uploads"));
    assert_eq!(from_file.data_dir, Some(PathBuf::from("/srv/data")));
    assert_eq!(
        from_file.classifier_url.as_deref(),
        Some("http://model.local/classify")
    );
    assert_eq!(from_file.max_upload_bytes, 1_048_576);

    let overridden = load_settings_from(
        &path,
        env_from(&[
            ("SERVER_BIND", "127.0.0.1:9000"),
            ("APP__BIND_ADDR", "127.0.0.1:9001"),
            ("APP__UPLOAD_DIR", "/tmp/up"),
            ("CLASSIFIER_URL", ""),
            ("APP__MAX_UPLOAD_BYTES", "2048"),
        ]),
    );
    assert_eq!(overridden.server_bind, "127.0.0.1:9001");
    assert_eq!(overridden.upload_dir, PathBuf::from("/tmp/up"));
    assert_eq!(overridden.data_dir, Some(PathBuf::from("/srv/data")));
    assert_eq!(overridden.classifier_url, None);
    assert_eq!(overridden.max_upload_bytes, 2048);
}

#[test]
fn unparseable_values_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("server.toml");
    fs::write(&path, "bind_addr = [").expect("write config");

    let settings = load_settings_from(&path, env_from(&[("APP__MAX_UPLOAD_BYTES", "lots")]));
    assert_eq!(settings, Settings::default());
}

#[test]
fn prepare_upload_dir_creates_nested_directories() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("a").join("b");
    let prepared = prepare_upload_dir(&nested).expect("prepare");
    assert_eq!(prepared, nested);
    assert!(nested.is_dir());
}
