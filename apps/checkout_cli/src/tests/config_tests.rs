use super::*;

use std::{
    collections::HashMap,
    env,
    time::{SystemTime, UNIX_EPOCH},
};

use shared::domain::CouponKind;

fn temp_config(name: &str, contents: &str) -> std::path::PathBuf {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let dir = env::temp_dir().join(format!("checkout_cli_config_{name}_{suffix}"));
    fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("checkout.toml");
    fs::write(&path, contents).expect("write config");
    path
}

#[test]
fn missing_file_yields_defaults() {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings, |_| None).expect("no overrides");
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.widget_config(), WidgetConfig::default());

    let path = env::temp_dir().join("checkout_cli_config_does_not_exist.toml");
    let loaded = load_settings_with(&path, |_| None).expect("missing file is not an error");
    assert_eq!(loaded, Settings::default());
}

#[test]
fn file_settings_override_defaults() {
    let path = temp_config(
        "file",
        r#"
catalog_endpoint = "https://shop.example.com/api/graphql"
catalog_type = "checkout_coupon"
settle_delay_ms = 250

[[fallback]]
code = "WELCOME10"
description = "10% off your first order"
type = "percentage"
"#,
    );

    let raw = fs::read_to_string(&path).expect("read");
    let mut settings = Settings::default();
    apply_file_settings(&mut settings, toml::from_str(&raw).expect("parse"));

    assert_eq!(
        settings.catalog_endpoint.as_deref(),
        Some("https://shop.example.com/api/graphql")
    );
    assert_eq!(settings.catalog_type, "checkout_coupon");
    assert_eq!(settings.settle_delay_ms, 250);
    assert_eq!(settings.success_ttl_ms, 3000);
    let fallback = settings.fallback.expect("fallback");
    assert_eq!(fallback.len(), 1);
    assert_eq!(fallback[0].kind, CouponKind::Percentage);
    assert!(fallback[0].active);

    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn unknown_keys_are_rejected() {
    let path = temp_config("unknown", "settle_delay = 10\n");
    let err = load_settings_with(&path, |_| None).expect_err("must fail");
    assert!(err.to_string().contains("invalid settings file"), "{err}");
    fs::remove_dir_all(path.parent().expect("parent")).expect("cleanup");
}

#[test]
fn env_lookup_applies_after_missing_file() {
    let path = env::temp_dir().join("checkout_cli_config_absent_with_env.toml");
    let loaded = load_settings_with(&path, |key| {
        (key == "APP__SETTLE_DELAY_MS").then(|| "125".to_string())
    })
    .expect("settings");
    assert_eq!(loaded.settle_delay_ms, 125);
    assert_eq!(loaded.catalog_type, "coupon");
}

#[test]
fn env_overrides_take_precedence() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("APP__CATALOG_ENDPOINT", "http://127.0.0.1:9000/graphql"),
        ("APP__SUCCESS_TTL_MS", "1500"),
        ("APP__ERROR_TTL_MS", " 2500 "),
    ]);
    let mut settings = Settings {
        catalog_endpoint: Some("https://ignored.example.com".into()),
        ..Settings::default()
    };

    apply_env_overrides(&mut settings, |key| env.get(key).map(|v| v.to_string()))
        .expect("overrides");

    assert_eq!(
        settings.catalog_endpoint.as_deref(),
        Some("http://127.0.0.1:9000/graphql")
    );
    let config = settings.widget_config();
    assert_eq!(config.message_ttl.success, Duration::from_millis(1500));
    assert_eq!(config.message_ttl.error, Duration::from_millis(2500));
}

#[test]
fn non_numeric_duration_is_an_error() {
    let err = apply_env_overrides(&mut Settings::default(), |key| {
        (key == "APP__SETTLE_DELAY_MS").then(|| "soon".to_string())
    })
    .expect_err("must fail");
    assert!(err.to_string().contains("APP__SETTLE_DELAY_MS"), "{err}");
}

#[test]
fn catalog_endpoint_must_be_http() {
    assert_eq!(
        normalize_catalog_endpoint(" https://shop.example.com/api/graphql ").expect("valid"),
        "https://shop.example.com/api/graphql"
    );
    assert!(normalize_catalog_endpoint("ftp://shop.example.com").is_err());
    assert!(normalize_catalog_endpoint("not a url").is_err());
}

#[test]
fn strategy_without_endpoint_is_static_fallback() {
    let strategy = Settings::default().catalog_strategy().expect("strategy");
    match strategy {
        CatalogStrategy::Static(coupons) => assert_eq!(coupons, fallback_catalog()),
        _ => panic!("expected static strategy"),
    }

    let settings = Settings {
        catalog_endpoint: Some("https://shop.example.com/api/graphql".into()),
        ..Settings::default()
    };
    assert!(matches!(
        settings.catalog_strategy().expect("strategy"),
        CatalogStrategy::QueryWithFallback { .. }
    ));
}
