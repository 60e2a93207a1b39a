use anyhow::Result;
use rust_sinewave::config::{Config, SchedulerConfig, WaveformConfig};
use std::fs;
use std::path::Path;
use std::sync::Once;
use tempfile::tempdir;

static INIT: Once = Once::new();

// Setup logger for tests
fn setup() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

#[test]
fn test_config_load_and_save() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let config = Config {
        waveform: WaveformConfig {
            sample_count: 64,
            gain: 2.5,
            phase: 0.25,
            bias: -1.0,
            noise_gain: 0.0,
            frequency: 440.0,
            max_sample_count: 4096,
            seed: Some(7),
        },
        scheduler: SchedulerConfig {
            tick_interval_us: 250,
            ..Default::default()
        },
    };

    config.save_to_file(&config_path)?;
    let loaded_config = Config::from_file(&config_path)?;
    assert_eq!(loaded_config, config);

    // Test loading default config for non-existent file
    let non_existent_path = temp_dir.path().join("non_existent.yaml");
    let default_config = Config::from_file(&non_existent_path)?;

    assert!(non_existent_path.exists());
    assert_eq!(default_config.waveform.sample_count, 30);
    assert_eq!(default_config.waveform.gain, 5.0);
    assert_eq!(default_config.waveform.noise_gain, 0.5);
    assert_eq!(default_config.scheduler.lifecycle_threshold_ms, 10_000);
    assert_eq!(default_config.scheduler.parameter_poll_ms, 100);

    Ok(())
}

#[test]
fn test_partial_config_uses_defaults() -> Result<()> {
    setup();
    let config = Config::from_yaml_str(
        r#"
waveform:
  sample_count: 4
  gain: 1
"#,
    )?;
    assert_eq!(config.waveform.sample_count, 4);
    assert_eq!(config.waveform.gain, 1.0);
    assert_eq!(config.waveform.bias, 0.0);
    assert_eq!(config.scheduler, SchedulerConfig::default());

    // An empty document is a valid configuration
    assert_eq!(Config::from_yaml_str("")?, Config::default());
    Ok(())
}

#[test]
fn test_schema_rejects_wrong_types() {
    setup();
    let result = Config::from_yaml_str(
        r#"
waveform:
  sample_count: "thirty"
"#,
    );
    assert!(result.is_err());

    let result = Config::from_yaml_str(
        r#"
waveform:
  sample_count: -5
"#,
    );
    assert!(result.is_err());

    let result = Config::from_yaml_str(
        r#"
scheduler:
  unknown_key: true
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_specific_rules_are_checked() {
    setup();
    let result = Config::from_yaml_str(
        r#"
scheduler:
  lifecycle_threshold_ms: 50
  parameter_poll_ms: 100
"#,
    );
    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("parameter_poll_ms"));
}

#[test]
fn test_config_error_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let invalid_yaml = r#"
waveform:
  gain: "loud"
  max_sample_count: 0
"#;
    fs::write(&config_path, invalid_yaml)?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err(), "Config loading should have failed");

    let sample_path = config_path.with_extension("sample.yaml");
    assert!(
        Path::new(&sample_path).exists(),
        "Sample config file was not created"
    );

    let sample_config = Config::from_file(&sample_path)?;
    assert_eq!(sample_config, Config::default());

    Ok(())
}

#[test]
fn test_apply_args_overrides_only_given_values() {
    let mut config = Config::default();
    config.apply_args(Some(128), None, Some(1.5), None, Some(0.0), None, Some(500));

    assert_eq!(config.waveform.sample_count, 128);
    assert_eq!(config.waveform.gain, 5.0);
    assert_eq!(config.waveform.phase, 1.5);
    assert_eq!(config.waveform.noise_gain, 0.0);
    assert_eq!(config.scheduler.tick_interval_us, 500);

    let settings = config.coordinator_settings();
    assert_eq!(settings.initial.sample_count, 128);
    assert_eq!(settings.initial.phase, 1.5);
    assert_eq!(settings.parameter_poll_ms, 100);
}
