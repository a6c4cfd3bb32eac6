use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

use super::*;

fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

fn temp_path(name: &str) -> PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    env::temp_dir().join(format!("petadmin_config_test_{suffix}_{name}"))
}

#[test]
fn file_values_override_defaults() {
    let mut settings = Settings::default();
    settings
        .apply_file(
            r#"
            backend_url = "https://store.example.org"
            api_key = "anon-from-file"
            user_agent = "ops-console"
            "#,
        )
        .expect("parse");

    assert_eq!(settings.backend_url.as_deref(), Some("https://store.example.org"));
    assert_eq!(settings.api_key.as_deref(), Some("anon-from-file"));
    assert_eq!(settings.access_token, None);
    assert_eq!(settings.user_agent, "ops-console");
}

#[test]
fn nested_tables_are_rejected() {
    let mut settings = Settings::default();
    assert!(settings.apply_file("[backend]\nurl = \"x\"").is_err());
}

#[test]
fn app_prefixed_env_wins_over_vendor_names() {
    let mut settings = Settings::default();
    settings.apply_env(env_from(&[
        ("SUPABASE_URL", "https://vendor.example.org"),
        ("APP__BACKEND_URL", "https://app.example.org"),
        ("SUPABASE_ANON_KEY", "vendor-key"),
        ("PETADMIN_ACCESS_TOKEN", "token-1"),
    ]));

    assert_eq!(settings.backend_url.as_deref(), Some("https://app.example.org"));
    assert_eq!(settings.api_key.as_deref(), Some("vendor-key"));
    assert_eq!(settings.access_token.as_deref(), Some("token-1"));
}

#[test]
fn flags_win_over_env_and_file() {
    let mut settings = Settings::default();
    settings
        .apply_file("backend_url = \"https://file.example.org\"\napi_key = \"file-key\"")
        .expect("parse");
    settings.apply_env(env_from(&[("APP__BACKEND_URL", "https://env.example.org")]));
    settings.apply_overrides(Overrides {
        backend_url: Some("https://flag.example.org".into()),
        ..Default::default()
    });

    let config = settings.gateway_config().expect("complete settings");
    assert_eq!(config.base_url, "https://flag.example.org");
    assert_eq!(config.api_key, "file-key");
    assert_eq!(config.access_token, None);
    assert_eq!(config.user_agent.as_deref(), Some(settings.user_agent.as_str()));
}

#[test]
fn missing_url_or_key_is_an_error() {
    let settings = Settings::default();
    let err = settings.gateway_config().expect_err("no url");
    assert!(err.to_string().contains("backend url"));

    let settings = Settings {
        backend_url: Some("https://store.example.org".into()),
        api_key: Some("   ".into()),
        ..Default::default()
    };
    let err = settings.gateway_config().expect_err("blank key");
    assert!(err.to_string().contains("api key"));
}

#[test]
fn explicit_config_path_must_exist() {
    let missing = temp_path("missing.toml");
    let err = load_settings(Some(&missing)).expect_err("missing file");
    assert!(err.to_string().contains("failed to read"));
}

#[test]
fn explicit_config_path_is_loaded() {
    let path = temp_path("petadmin.toml");
    fs::write(&path, "access_token = \"from-file\"\n").expect("write config");

    let settings = load_settings(Some(&path)).expect("load");
    if env::var("PETADMIN_ACCESS_TOKEN").is_err() && env::var("APP__ACCESS_TOKEN").is_err() {
        assert_eq!(settings.access_token.as_deref(), Some("from-file"));
    }

    fs::remove_file(path).expect("cleanup");
}
