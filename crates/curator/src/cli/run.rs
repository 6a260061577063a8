use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use console::style;
use tracing::info;

use curator::curator_core::config::CuratorConfig;
use curator::Curator;

use super::init_logging;

/// Run the scheduler.
#[derive(Parser)]
pub struct RunCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "curator.toml")]
    pub config: String,

    /// Seconds to wait for running jobs on shutdown.
    #[arg(long, default_value_t = 30)]
    pub drain_timeout: u64,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl RunCommand {
    /// Execute the run command.
    pub async fn execute(self) -> Result<()> {
        let config_path = std::path::Path::new(&self.config);
        if !config_path.exists() {
            anyhow::bail!("Configuration file not found: {}", self.config);
        }

        let config = CuratorConfig::from_file(config_path)?;
        init_logging(&config.logging, self.verbose);

        println!();
        println!(
            "  {} v{}",
            style("Curator").bold().cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!(
            "  {} dispatchers, {} jobs",
            style(config.dispatchers.len()).bold(),
            style(config.jobs.len()).bold()
        );
        println!();

        info!("Loaded configuration from {}", self.config);

        let curator = Curator::builder()
            .config(config)
            .drain_timeout(Duration::from_secs(self.drain_timeout))
            .build()?;

        curator.run().await?;

        println!("\n  {} Goodbye!", style("✓").green().bold());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_command_defaults() {
        let cmd = RunCommand::try_parse_from(["run"]).unwrap();
        assert_eq!(cmd.config, "curator.toml");
        assert_eq!(cmd.drain_timeout, 30);
        assert!(!cmd.verbose);
    }

    #[tokio::test]
    async fn test_missing_config_file() {
        let cmd = RunCommand {
            config: "/nonexistent/curator.toml".to_string(),
            drain_timeout: 1,
            verbose: false,
        };
        let err = cmd.execute().await.unwrap_err();
        assert!(err.to_string().contains("Configuration file not found"));
    }
}
