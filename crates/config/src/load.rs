use crate::Config;
use crate::error::{ErrorKind, Result};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "VIGIL_";
const CONFIG_FILENAME: &str = "config.toml";

fn default_config_file() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", crate::APPLICATION).map(|dirs| dirs.config_dir().join(CONFIG_FILENAME))
}

fn file_provider(path: &Path) -> Result<Figment> {
    let figment = Figment::new();
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
    Ok(match extension.as_deref() {
        Some("toml") | None => figment.merge(Toml::file(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        Some(other) => exn::bail!(ErrorKind::Parse(format!("unsupported configuration format `{other}`"))),
    })
}

impl Config {
    /// Build the layered [`Figment`] without extracting it.
    ///
    /// An explicitly passed `file` must exist; the implicit per-user file is
    /// optional.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                figment = figment.merge(file_provider(path)?);
            },
            None => {
                if let Some(path) = default_config_file().filter(|p| p.is_file()) {
                    tracing::debug!(path = %path.display(), "Loading per-user configuration");
                    figment = figment.merge(file_provider(&path)?);
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate a [`Config`] from an already-built [`Figment`].
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract().map_err(|e| ErrorKind::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from every layer, see the crate documentation.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(file)?)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Config, HashingMode, ScanPolicy, error::ErrorKind};
    use figment::Jail;

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.toml");
        std::fs::write(
            &path,
            r#"
                [scan]
                threads = 3
                policy = "cycle"
                hashing = "inline"

                [store]
                expected_rows = 2
            "#,
        )
        .unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.scan.threads, 3);
        assert_eq!(config.scan.policy, ScanPolicy::Cycle);
        assert_eq!(config.scan.hashing, HashingMode::Inline);
        assert_eq!(config.store.expected_rows, 2);
        // Untouched values keep their defaults.
        assert_eq!(config.feed.shards, 488);
    }

    #[test]
    fn test_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.yaml");
        std::fs::write(&path, "feed:\n  concurrency: 2\n  retry:\n    max_attempts: 4\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.feed.concurrency, 2);
        assert_eq!(config.feed.retry.max_attempts, Some(4));
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vigil.json");
        std::fs::write(&path, r#"{ "scan": { "threads": 0 } }"#).unwrap();
        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid("scan.threads", _)));
    }

    #[test]
    fn test_environment_overrides() {
        Jail::expect_with(|jail| {
            jail.set_env("VIGIL_SCAN__THREADS", "5");
            jail.set_env("VIGIL_SCAN__POLICY", "cycle");
            jail.set_env("VIGIL_STORE__BYPASS_VALIDATION", "true");
            let config = Config::load(None).map_err(|e| format!("{e:?}"))?;
            assert_eq!(config.scan.threads, 5);
            assert_eq!(config.scan.policy, ScanPolicy::Cycle);
            assert!(config.store.bypass_validation);
            Ok(())
        });
    }
}
