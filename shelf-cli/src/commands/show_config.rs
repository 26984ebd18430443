//! Print the effective configuration.

use anyhow::{Context, Result};

use crate::config::{default_config_path, Config};

/// Run the config command.
pub fn run(config: &Config) -> Result<()> {
    if let Some(path) = default_config_path() {
        println!("# default location: {}", path.display());
    }
    let text = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_default_config() {
        assert!(run(&Config::default()).is_ok());
    }
}
