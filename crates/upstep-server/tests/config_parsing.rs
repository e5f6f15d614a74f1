use std::{env, fs, time::Duration};

use upstep_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("upstep.toml");

    let toml_content = r#"
[server]
host = "127.0.0.1"
port = 8081

[logging]
level = "debug"

[cors]
allowed_origins = ["https://coach.example.com"]

[admin]
api_key = "operator-secret"

[realtime]
channel_capacity = 16
heartbeat_secs = 10

[listing]
ttl_secs = 600
fetch_timeout_ms = 1500

[upstream]
base_url = "https://storage.example.com/listings/"
public_base_url = "https://cdn.example.com"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.server.port, 8081);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.cors.allowed_origins, ["https://coach.example.com"]);
    assert_eq!(cfg.admin.api_key.as_deref(), Some("operator-secret"));
    assert_eq!(cfg.realtime.channel_capacity, 16);
    assert_eq!(cfg.listing.ttl(), Duration::from_secs(600));
    assert_eq!(cfg.listing.fetch_timeout(), Duration::from_millis(1500));
    // Unset keys fall back to defaults
    assert_eq!(cfg.listing.prefetch_limit, 5);
    assert_eq!(
        cfg.upstream.public_base_url.as_deref(),
        Some("https://cdn.example.com")
    );

    // 2) Env override should win over file
    unsafe {
        env::set_var("UPSTEP__LISTING__TTL_SECS", "60");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.listing.ttl_secs, 60);
    unsafe {
        env::remove_var("UPSTEP__LISTING__TTL_SECS");
    }

    // 3) Invalid config should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[listing]
prefetch_limit = 0
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(err.contains("prefetch_limit must be > 0"));
}
