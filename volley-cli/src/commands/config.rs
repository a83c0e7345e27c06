//! `volley config`

use super::load_config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{error, info};
use volley_config::VolleyConfig;

/// Handle configuration validation
pub fn handle_config_validate(config_file: &Path) -> Result<()> {
    info!("Validating configuration file: {:?}", config_file);

    if !config_file.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found: {:?}",
            config_file
        ));
    }

    match load_config(Some(config_file)) {
        Ok(_config) => {
            println!("✅ Configuration file is valid");
            info!("Configuration validation passed");
            Ok(())
        }
        Err(e) => {
            println!("❌ Configuration validation failed: {:#}", e);
            error!("Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}

/// Handle configuration generation
pub fn handle_config_generate(output: &Path, force: bool) -> Result<()> {
    info!("Generating configuration at: {:?}", output);

    if output.exists() && !force {
        return Err(anyhow::anyhow!(
            "Output file already exists: {:?}. Use --force to overwrite.",
            output
        ));
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    fs::write(output, VolleyConfig::generate_sample())
        .context("Failed to write configuration file")?;

    println!("✅ Configuration generated at: {:?}", output);
    println!(
        "🔧 Validate with: volley config validate --config-file {:?}",
        output
    );
    Ok(())
}

/// Renders a configuration as yaml or json
pub fn render_config(config: &VolleyConfig, format: &str) -> Result<String> {
    let value = serde_json::to_value(config).context("Failed to serialize config")?;
    match format.to_lowercase().as_str() {
        "yaml" | "yml" => serde_yaml::to_string(&value).context("Failed to serialize to YAML"),
        "json" => serde_json::to_string_pretty(&value).context("Failed to serialize to JSON"),
        _ => Err(anyhow::anyhow!(
            "Unknown output format: {}. Valid formats: yaml, json",
            format
        )),
    }
}

/// Handle configuration display
pub fn handle_config_show(config_file: Option<&Path>, format: &str) -> Result<()> {
    info!("Showing configuration (format: {})", format);
    let config = load_config(config_file)?;
    println!("{}", render_config(&config, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("configs").join("volley.yaml");

        handle_config_generate(&output, false).unwrap();
        assert!(handle_config_generate(&output, false).is_err());
        handle_config_generate(&output, true).unwrap();
        handle_config_validate(&output).unwrap();
    }

    #[test]
    fn test_validate_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(handle_config_validate(&dir.path().join("absent.yaml")).is_err());
    }

    #[test]
    fn test_render_formats() {
        let config = VolleyConfig::default();
        let json = render_config(&config, "json").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["engine"]["thread_stop_timeout_ms"], 5000);

        let yaml = render_config(&config, "YAML").unwrap();
        assert!(yaml.contains("grace_per_thread_ms: 10"));
        assert!(render_config(&config, "toml").is_err());
    }
}
