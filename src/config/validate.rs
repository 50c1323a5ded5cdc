// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::config::profiles::ProfileRegistry;
use crate::errors::{PipelineError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PipelineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let registry = ProfileRegistry::with_overrides(&raw.profile)?;
        registry.lookup(&raw.config.profile)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.serve, registry))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global_config(cfg)?;
    validate_serve(cfg)?;
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.source_dir.trim().is_empty() {
        return Err(PipelineError::config(
            "[config].source_dir must not be empty",
        ));
    }
    if cfg.config.package_dir.trim().is_empty() {
        return Err(PipelineError::config(
            "[config].package_dir must not be empty",
        ));
    }
    Ok(())
}

fn validate_serve(cfg: &RawConfigFile) -> Result<()> {
    if cfg.serve.port == 0 {
        return Err(PipelineError::config("[serve].port must be >= 1 (got 0)"));
    }
    if let Some(proxy) = &cfg.serve.proxy {
        if proxy.trim().is_empty() || proxy.contains('/') {
            return Err(PipelineError::config(format!(
                "[serve].proxy must be a bare host[:port], got {proxy:?}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::profiles::ProfileConfig;

    #[test]
    fn defaults_validate() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        assert_eq!(cfg.active_profile().unwrap().name(), "wordpress");
    }

    #[test]
    fn unknown_active_profile_fails() {
        let mut raw = RawConfigFile::default();
        raw.config.profile = "drupal".to_string();
        assert!(matches!(
            ConfigFile::try_from(raw),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn invalid_user_profile_fails() {
        let mut raw = RawConfigFile::default();
        raw.profile.insert(
            "broken".to_string(),
            ProfileConfig {
                root: "out".into(),
                html: "".into(),
                css: "out/css".into(),
                js: "out/js".into(),
                img: "out".into(),
                libs: "out/libs".into(),
                fonts: "out/fonts".into(),
            },
        );
        assert!(ConfigFile::try_from(raw).is_err());
    }

    #[test]
    fn proxy_with_scheme_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.serve.proxy = Some("http://site.loc".to_string());
        assert!(ConfigFile::try_from(raw).is_err());
    }
}
