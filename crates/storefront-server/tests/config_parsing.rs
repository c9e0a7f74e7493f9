use std::{env, fs};

use storefront_cache::SerializationFormat;
use storefront_server::config::loader::load_config;

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("storefront.toml");

    let toml_content = r#"
[cache]
l1_ttl_secs = 60
l2_ttl_secs = 600
index_all_keys = true
format = "msgpack"
namespace = "shop:"

[redis]
enabled = false

[warmup]
hot_product_ids = [7, 8]

[logging]
level = "debug"
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses; unspecified keys keep their defaults
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.cache.l1_ttl_secs, 60);
    assert_eq!(cfg.cache.l2_ttl_secs, 600);
    assert_eq!(cfg.cache.promotion_ttl_secs, 300);
    assert!(cfg.cache.index_all_keys);
    assert_eq!(cfg.cache.format, SerializationFormat::MessagePack);
    assert_eq!(cfg.cache.namespace, "shop:");
    assert_eq!(cfg.warmup.hot_product_ids, vec![7, 8]);
    assert_eq!(cfg.warmup.reference_page_size, 20);
    assert_eq!(cfg.logging.level, "debug");

    // 2) Env override should win over file
    unsafe {
        env::set_var("STOREFRONT__CACHE__L1_TTL_SECS", "45");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.cache.l1_ttl_secs, 45);
    unsafe {
        env::remove_var("STOREFRONT__CACHE__L1_TTL_SECS");
    }

    // 3) Invalid values are rejected
    let bad = dir.path().join("bad.toml");
    fs::write(&bad, "[cache]\nl1_max_entries = 0\n").expect("write toml");
    let err = load_config(bad.to_str()).unwrap_err();
    assert!(err.contains("l1_max_entries"), "unexpected error: {err}");

    let bad_level = dir.path().join("bad_level.toml");
    fs::write(&bad_level, "[logging]\nlevel = \"loud\"\n").expect("write toml");
    assert!(load_config(bad_level.to_str()).is_err());
}

#[test]
fn missing_file_uses_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");

    let cfg = load_config(path.to_str()).expect("defaults should be valid");
    assert_eq!(cfg.cache.l2_ttl_secs, 1800);
    assert!(!cfg.redis.enabled);
}
