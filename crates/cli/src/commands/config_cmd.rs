//! `stepwise config`: Configuration management commands.

use stepwise_config::AppConfig;

const MASK: &str = "********";

/// Copy of `config` with every API key replaced by a mask.
fn masked(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    if config.api_key.is_some() {
        config.api_key = Some(MASK.into());
    }
    for provider in config.providers.values_mut() {
        if provider.api_key.is_some() {
            provider.api_key = Some(MASK.into());
        }
    }
    config
}

pub fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    println!("{}", toml::to_string_pretty(&masked(&config))?);
    Ok(())
}

pub fn init(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let dir = AppConfig::config_dir();
    let path = dir.join("config.toml");
    if path.exists() && !force {
        return Err(format!("{} already exists (use --force to overwrite)", path.display()).into());
    }
    std::fs::create_dir_all(&dir)?;
    std::fs::write(&path, AppConfig::default_toml())?;
    println!("Wrote {}", path.display());
    Ok(())
}

pub fn path() {
    println!("{}", AppConfig::config_dir().join("config.toml").display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use stepwise_config::ProviderConfig;

    #[test]
    fn secrets_are_masked() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret".into());
        config.providers.insert(
            "openrouter".into(),
            ProviderConfig {
                api_key: Some("sk-or-secret".into()),
                api_url: None,
            },
        );

        let rendered = toml::to_string_pretty(&masked(&config)).unwrap();
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains(MASK));
    }

    #[test]
    fn config_path_is_under_config_dir() {
        let path = AppConfig::config_dir().join("config.toml");
        assert!(path.ends_with(".stepwise/config.toml"));
    }
}
