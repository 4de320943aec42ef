//! Layered service settings: built-in defaults, an optional file, then environment.
//!
//! Environment keys use the `GATEWAY` prefix with `__` as separator, e.g.
//! `GATEWAY__BIND_ADDR` or `GATEWAY__TRAINING__EPOCHS`. The bare `MODEL_DIR` variable
//! is honoured last so existing deployments keep working.

use anyhow::Result;
use config::{builder::DefaultState, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const ENV_PREFIX: &str = "GATEWAY";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub service_name: String,
    pub bind_addr: String,
    pub model_dir: PathBuf,
    pub default_model_file: String,
    pub api_title: String,
    pub api_version: String,
    /// Load the default model at startup instead of waiting for the first request.
    pub preload: bool,
    pub training: TrainingDefaults,
}

/// Hyperparameter defaults handed to the external training job. Not read by serving.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct TrainingDefaults {
    pub epochs: u32,
    pub batch_size: u32,
    pub learning_rate: f64,
}

impl Settings {
    pub fn default_model_path(&self) -> PathBuf { self.model_dir.join(&self.default_model_file) }
}

fn builder(service: &str, file: Option<&Path>, env_prefix: &str) -> Result<ConfigBuilder<DefaultState>> {
    let mut builder = config::Config::builder()
        .set_default("service_name", service)?
        .set_default("bind_addr", "0.0.0.0:8000")?
        .set_default("model_dir", "/app/models")?
        .set_default("default_model_file", "model.json")?
        .set_default("api_title", "Inference Gateway")?
        .set_default("api_version", env!("CARGO_PKG_VERSION"))?
        .set_default("preload", true)?
        .set_default("training.epochs", 5_i64)?
        .set_default("training.batch_size", 32_i64)?
        .set_default("training.learning_rate", 0.001_f64)?;
    if let Some(path) = file {
        builder = builder.add_source(File::from(path).required(true));
    }
    Ok(builder.add_source(Environment::with_prefix(env_prefix).separator("__").try_parsing(true)))
}

/// Loads settings from an explicit file and env prefix. `load_settings` is the process entry point.
pub fn load_settings_from(service: &str, file: Option<&Path>, env_prefix: &str) -> Result<Settings> {
    let cfg = builder(service, file, env_prefix)?.build()?;
    Ok(cfg.try_deserialize()?)
}

pub fn load_settings(service: &str) -> Result<Settings> {
    let file = std::env::var("GATEWAY_CONFIG_FILE").ok().map(PathBuf::from);
    let cfg = builder(service, file.as_deref(), ENV_PREFIX)?
        .set_override_option("model_dir", std::env::var("MODEL_DIR").ok())?
        .build()?;
    Ok(cfg.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_apply_without_sources() {
        let s = load_settings_from("svc", None, "GATEWAY_SETTINGS_TEST_UNSET").unwrap();
        assert_eq!(s.service_name, "svc");
        assert_eq!(s.bind_addr, "0.0.0.0:8000");
        assert_eq!(s.default_model_path(), PathBuf::from("/app/models/model.json"));
        assert!(s.preload);
        assert_eq!(s.training, TrainingDefaults { epochs: 5, batch_size: 32, learning_rate: 0.001 });
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "model_dir: /srv/models\ndefault_model_file: regressor.json\ntraining:\n  epochs: 12").unwrap();
        let s = load_settings_from("svc", Some(&path), "GATEWAY_SETTINGS_TEST_UNSET").unwrap();
        assert_eq!(s.default_model_path(), PathBuf::from("/srv/models/regressor.json"));
        assert_eq!(s.training.epochs, 12);
        assert_eq!(s.training.batch_size, 32);
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.yaml");
        std::fs::write(&path, "bind_addr: 0.0.0.0:7000\napi_title: from-file\npreload: true\n").unwrap();
        std::env::set_var("GWTEST_ENV__BIND_ADDR", "127.0.0.1:9100");
        std::env::set_var("GWTEST_ENV__PRELOAD", "false");
        let s = load_settings_from("svc", Some(&path), "GWTEST_ENV").unwrap();
        assert_eq!(s.bind_addr, "127.0.0.1:9100");
        assert!(!s.preload);
        assert_eq!(s.api_title, "from-file");
    }

    // The only test touching the real process variables, so it does not race the others.
    #[test]
    fn process_entry_point_reads_config_file_and_model_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gateway.toml");
        std::fs::write(&path, "model_dir = \"/from/file\"\ndefault_model_file = \"regressor.json\"\n").unwrap();
        std::env::set_var("GATEWAY_CONFIG_FILE", &path);
        std::env::set_var("GATEWAY__MODEL_DIR", "/from/gateway-env");
        std::env::set_var("MODEL_DIR", "/from/model-dir");
        let s = load_settings("svc").unwrap();
        assert_eq!(s.default_model_path(), PathBuf::from("/from/model-dir/regressor.json"));

        std::env::remove_var("MODEL_DIR");
        let s = load_settings("svc").unwrap();
        assert_eq!(s.model_dir, PathBuf::from("/from/gateway-env"));

        std::env::remove_var("GATEWAY__MODEL_DIR");
        let s = load_settings("svc").unwrap();
        assert_eq!(s.model_dir, PathBuf::from("/from/file"));
        std::env::remove_var("GATEWAY_CONFIG_FILE");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let res = load_settings_from("svc", Some(Path::new("/definitely/not/here.yaml")), "GATEWAY_SETTINGS_TEST_UNSET");
        assert!(res.is_err());
    }
}
