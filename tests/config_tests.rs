use std::fs::File;
use std::io::Write;
use tempfile::tempdir;

use beatsaver_playlist_batch::config::Config;

#[test]
fn config_from_path_parses_toml() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("cfg.toml");
    let mut f = File::create(&cfg_path).unwrap();
    let toml = r#"
api_base = "http://localhost:8080/"
batch_size = 50
log_dir = "/tmp/bs-logs"
"#;
    f.write_all(toml.as_bytes()).unwrap();
    let cfg = Config::from_path(&cfg_path).expect("parse config");
    assert_eq!(cfg.batch_size, 50);
    assert_eq!(cfg.request_timeout_secs, 60);
    assert_eq!(cfg.log_dir.to_str().unwrap(), "/tmp/bs-logs");
    assert_eq!(cfg.cookie_domain, "beatsaver.com");
}

#[test]
fn config_from_path_rejects_zero_timeout() {
    let td = tempdir().unwrap();
    let cfg_path = td.path().join("cfg.toml");
    std::fs::write(&cfg_path, "request_timeout_secs = 0\n").unwrap();
    assert!(Config::from_path(&cfg_path).is_err());
}

#[test]
fn missing_default_config_falls_back_to_defaults() {
    let td = tempdir().unwrap();
    let cfg = Config::load_or_default(&td.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.batch_size, 100);
    assert_eq!(cfg.session_cookie_name, "BMSESSIONID");
}
