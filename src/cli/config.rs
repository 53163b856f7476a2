// ABOUTME: CLI config command - print the effective layered configuration,
// optionally persisting it as the user's config file

use anyhow::Result;

use super::{ConfigArgs, OutputFormat};
use crate::config::AppConfig;

/// Execute the config command
pub fn execute(args: ConfigArgs, config: &AppConfig, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
        OutputFormat::Text => print!("{}", toml::to_string_pretty(config)?),
    }

    if args.save {
        let path = config.save()?;
        eprintln!("Saved configuration to {}", path.display());
    }
    Ok(())
}
