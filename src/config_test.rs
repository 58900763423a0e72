use super::*;
use std::collections::HashMap;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| map.get(key).cloned()
}

/// # Safety
/// Tests must run with `--test-threads=1` to avoid env races.
unsafe fn clear_app_env() {
    unsafe {
        for key in [
            "PORT",
            "DATABASE_URL",
            "LAYOUT_BREAKPOINTS",
            "LAYOUT_FOOTPRINTS",
            "SANDBOX_ISOLATION",
            "SANDBOX_PUBLIC_BASE",
            "REGISTRY_FLUSH_INTERVAL_MS",
            "GENERATION_MAX_TOKENS",
        ] {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn from_env_defaults() {
    unsafe { clear_app_env() };
    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg, AppConfig::default());
    assert_eq!(cfg.port, 3000);
    assert!(cfg.database_url.is_none());
    assert!(cfg.sandbox_isolation);
    assert_eq!(cfg.layout.breakpoints.max_columns(), 4);
}

#[test]
fn from_env_reads_overrides() {
    unsafe {
        clear_app_env();
        std::env::set_var("PORT", "8080");
        std::env::set_var("SANDBOX_ISOLATION", "disabled");
        std::env::set_var("REGISTRY_FLUSH_INTERVAL_MS", "1000");
    }
    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.port, 8080);
    assert!(!cfg.sandbox_isolation);
    assert_eq!(cfg.flush_interval, Duration::from_secs(1));
    unsafe { clear_app_env() };
}

#[test]
fn lookup_parses_layout_settings() {
    let cfg = AppConfig::from_lookup(lookup(&[
        ("LAYOUT_BREAKPOINTS", "500, 900"),
        ("LAYOUT_FOOTPRINTS", "1x1,1x2,2x2"),
        ("DATABASE_URL", "postgres://localhost/widgets"),
        ("SANDBOX_PUBLIC_BASE", "/frames"),
        ("GENERATION_MAX_TOKENS", "4000"),
    ]))
    .unwrap();
    assert_eq!(cfg.layout.breakpoints.columns_for_width(499), 1);
    assert_eq!(cfg.layout.breakpoints.columns_for_width(900), 3);
    assert_eq!(cfg.layout.footprints.medium, Footprint { w: 1, h: 2 });
    assert_eq!(cfg.layout.footprints.large, Footprint { w: 2, h: 2 });
    assert_eq!(cfg.database_url.as_deref(), Some("postgres://localhost/widgets"));
    assert_eq!(cfg.sandbox_public_base, "/frames");
    assert_eq!(cfg.generation_max_tokens, 4000);
}

#[test]
fn blank_values_fall_back_to_defaults() {
    let cfg = AppConfig::from_lookup(lookup(&[("PORT", "  "), ("DATABASE_URL", "")])).unwrap();
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert!(cfg.database_url.is_none());
}

#[test]
fn rejects_malformed_values() {
    assert!(matches!(
        AppConfig::from_lookup(lookup(&[("PORT", "http")])),
        Err(ConfigError::Invalid { var: "PORT", .. })
    ));
    assert!(matches!(
        AppConfig::from_lookup(lookup(&[("SANDBOX_ISOLATION", "maybe")])),
        Err(ConfigError::Invalid { var: "SANDBOX_ISOLATION", .. })
    ));
    assert!(matches!(
        AppConfig::from_lookup(lookup(&[("LAYOUT_BREAKPOINTS", "1024,768")])),
        Err(ConfigError::Layout(LayoutError::InvalidBreakpoints(_)))
    ));
}

#[test]
fn footprints_need_three_positive_entries() {
    assert!(parse_footprints("1x1,2x1").is_err());
    assert!(parse_footprints("1x1,0x1,3x1").is_err());
    assert!(parse_footprints("1x1,2,3x1").is_err());
    let table = parse_footprints("1X1, 2x1 ,3x1").unwrap();
    assert_eq!(table, FootprintTable::default());
}

#[test]
fn breakpoints_reject_garbage() {
    assert!(parse_breakpoints("640,abc").is_err());
    assert_eq!(parse_breakpoints("640,768,1024").unwrap(), Breakpoints::default());
}
