use planweave::config::{
    load_settings, save_settings, ConfigError, CoreSettings, SandboxLimits,
    DEFAULT_SANDBOX_TIMEOUT_MS, DEFAULT_TURN_HISTORY_CAP, MAX_SANDBOX_CODE_CHARS,
    MAX_SANDBOX_TIMEOUT_MS, MIN_SANDBOX_TIMEOUT_MS,
};

#[test]
fn config_module_defaults_match_the_documented_limits() {
    let settings = CoreSettings::default();
    assert_eq!(settings.max_turn_history, DEFAULT_TURN_HISTORY_CAP);
    assert_eq!(settings.max_turn_history, 10);
    assert!(settings.timezone.is_none());
    assert!(settings.state_root.is_none());
    assert_eq!(settings.sandbox.max_code_chars, MAX_SANDBOX_CODE_CHARS);
    assert_eq!(settings.sandbox.min_timeout_ms, MIN_SANDBOX_TIMEOUT_MS);
    assert_eq!(settings.sandbox.max_timeout_ms, MAX_SANDBOX_TIMEOUT_MS);
    assert_eq!(settings.sandbox.default_timeout_ms, DEFAULT_SANDBOX_TIMEOUT_MS);
    settings.validate().expect("defaults validate");
}

#[test]
fn config_module_validates_timezone_names() {
    let settings = CoreSettings {
        timezone: Some("Asia/Taipei".to_string()),
        ..CoreSettings::default()
    };
    let tz = settings.timezone_tz().expect("known timezone");
    assert_eq!(tz, Some(chrono_tz::Asia::Taipei));

    let settings = CoreSettings {
        timezone: Some("Mars/Olympus".to_string()),
        ..CoreSettings::default()
    };
    let error = settings.validate().expect_err("unknown timezone");
    assert!(matches!(error, ConfigError::InvalidTimezone { value } if value == "Mars/Olympus"));
}

#[test]
fn config_module_rejects_inverted_sandbox_limits() {
    let settings = CoreSettings {
        sandbox: SandboxLimits {
            min_timeout_ms: 2000,
            max_timeout_ms: 1500,
            ..SandboxLimits::default()
        },
        ..CoreSettings::default()
    };
    assert!(matches!(
        settings.validate(),
        Err(ConfigError::InvalidSandboxLimits { .. })
    ));

    let settings = CoreSettings {
        sandbox: SandboxLimits {
            default_timeout_ms: 5,
            ..SandboxLimits::default()
        },
        ..CoreSettings::default()
    };
    assert!(settings.validate().is_err());
}

#[test]
fn config_module_rejects_zero_history_cap() {
    let settings = CoreSettings {
        max_turn_history: 0,
        ..CoreSettings::default()
    };
    assert!(matches!(
        settings.validate(),
        Err(ConfigError::InvalidHistoryCap)
    ));
}

#[test]
fn config_module_round_trips_through_yaml() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("nested").join("settings.yaml");

    let settings = CoreSettings {
        timezone: Some("Asia/Taipei".to_string()),
        max_turn_history: 5,
        state_root: Some(dir.path().join("state")),
        sandbox: SandboxLimits {
            max_code_chars: 500,
            ..SandboxLimits::default()
        },
    };
    save_settings(&path, &settings).expect("settings saved");
    let loaded = load_settings(&path).expect("settings loaded");
    assert_eq!(loaded, settings);
}

#[test]
fn config_module_partial_yaml_fills_defaults() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("settings.yaml");
    std::fs::write(&path, "timezone: Asia/Taipei\n").expect("fixture written");

    let loaded = load_settings(&path).expect("settings loaded");
    assert_eq!(loaded.timezone.as_deref(), Some("Asia/Taipei"));
    assert_eq!(loaded.max_turn_history, DEFAULT_TURN_HISTORY_CAP);
    assert_eq!(loaded.sandbox, SandboxLimits::default());
}

#[test]
fn config_module_load_surfaces_read_and_parse_errors() {
    let dir = tempfile::tempdir().expect("temp dir");

    let missing = dir.path().join("missing.yaml");
    assert!(matches!(
        load_settings(&missing),
        Err(ConfigError::Read { .. })
    ));

    let garbled = dir.path().join("garbled.yaml");
    std::fs::write(&garbled, "max_turn_history: [not a number\n").expect("fixture written");
    assert!(matches!(
        load_settings(&garbled),
        Err(ConfigError::Parse { .. })
    ));

    let invalid = dir.path().join("invalid.yaml");
    std::fs::write(&invalid, "max_turn_history: 0\n").expect("fixture written");
    assert!(matches!(
        load_settings(&invalid),
        Err(ConfigError::InvalidHistoryCap)
    ));
}
