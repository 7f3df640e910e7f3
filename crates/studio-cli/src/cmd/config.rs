use crate::output::{print_fields, print_json};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use studio_core::config::{Config, IdentityConfig, WarnLevel};

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    match subcmd {
        ConfigSubcommand::Show => show(&config, json),
        ConfigSubcommand::Validate => validate(&config, json),
    }
}

fn show(config: &Config, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(config);
    }
    let identity = match &config.identity {
        IdentityConfig::Local => "local".to_string(),
        IdentityConfig::Http {
            base_url,
            timeout_secs,
            ..
        } => format!("http {base_url} (timeout {timeout_secs}s)"),
    };
    print_fields(&[
        ("Studio", Some(config.studio.name.clone())),
        ("Identity", Some(identity)),
        ("How heard", Some(config.onboarding.how_heard.clone())),
        (
            "Credential",
            Some(format!(
                "{} word(s) + {} char suffix",
                config.credential.prefix_words, config.credential.suffix_len
            )),
        ),
    ]);
    Ok(())
}

fn validate(config: &Config, json: bool) -> anyhow::Result<()> {
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
