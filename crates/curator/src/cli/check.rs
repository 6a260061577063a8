use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Parser;
use console::style;
use serde::Serialize;

use curator::curator_core::config::{CuratorConfig, JobConfig};
use curator::curator_core::schedule::format_duration;

/// Validate configuration and show upcoming runs.
#[derive(Parser)]
pub struct CheckCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "curator.toml")]
    pub config: String,

    /// Number of upcoming fire times to show per job.
    #[arg(long, default_value_t = 3)]
    pub upcoming: usize,

    /// Print the preview as JSON.
    #[arg(long)]
    pub json: bool,
}

/// A job's trigger and next fire times.
#[derive(Debug, Serialize)]
struct JobPreview {
    name: String,
    dispatcher: String,
    trigger: String,
    upcoming: Vec<DateTime<Utc>>,
}

impl CheckCommand {
    /// Execute the check command.
    pub fn execute(self) -> Result<()> {
        let config = CuratorConfig::from_file(&self.config)?;
        config.validate()?;

        let now = Utc::now();
        let previews = config
            .jobs
            .iter()
            .map(|job| preview(job, now, self.upcoming))
            .collect::<Result<Vec<_>>>()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&previews)?);
            return Ok(());
        }

        println!(
            "{} {} is valid",
            style("✓").green().bold(),
            style(&self.config).cyan()
        );
        println!();

        for dispatcher in &config.dispatchers {
            println!(
                "  {} {} (workers: {}, queue: {})",
                style("dispatcher").dim(),
                style(&dispatcher.name).bold(),
                dispatcher.max_workers,
                dispatcher.max_queue
            );
        }
        println!();

        for job in previews {
            println!(
                "  {} [{}] {}",
                style(&job.name).bold(),
                job.dispatcher,
                job.trigger
            );
            for time in job.upcoming {
                println!("      {}", style(time.format("%Y-%m-%d %H:%M:%S UTC")).dim());
            }
        }

        Ok(())
    }
}

/// Describe a job's trigger and its next `count` fire times.
fn preview(job: &JobConfig, now: DateTime<Utc>, count: usize) -> Result<JobPreview> {
    let (trigger, upcoming) = match job.schedule()? {
        Some(schedule) => (schedule.to_string(), schedule.upcoming(now, count)),
        None => {
            let delay = job.delay().unwrap_or_default();
            let at = now + chrono::Duration::from_std(delay)?;
            (format!("once after {}", format_duration(delay)), vec![at])
        }
    };

    Ok(JobPreview {
        name: job.name.clone(),
        dispatcher: job.dispatcher.clone(),
        trigger,
        upcoming,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"
        [[dispatchers]]
        name = "data"

        [[jobs]]
        name = "refresh_feeds"
        dispatcher = "data"
        cron = "*/5 * * * *"
        command = ["true"]

        [[jobs]]
        name = "scan_library"
        dispatcher = "data"
        delay_secs = 30
        command = ["true"]
    "#;

    #[test]
    fn test_preview() {
        let config = CuratorConfig::parse_toml(CONFIG).unwrap();
        let now = Utc::now();

        let cron = preview(&config.jobs[0], now, 4).unwrap();
        assert_eq!(cron.trigger, "cron 0 */5 * * * *");
        assert_eq!(cron.upcoming.len(), 4);

        let once = preview(&config.jobs[1], now, 4).unwrap();
        assert_eq!(once.trigger, "once after 30s");
        assert_eq!(once.upcoming, vec![now + chrono::Duration::seconds(30)]);

        let json = serde_json::to_value(&once).unwrap();
        assert_eq!(json["dispatcher"], "data");
    }

    #[test]
    fn test_check_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let cmd = CheckCommand {
            config: file.path().display().to_string(),
            upcoming: 2,
            json: false,
        };
        cmd.execute().unwrap();

        let cmd = CheckCommand {
            config: file.path().display().to_string(),
            upcoming: 2,
            json: true,
        };
        cmd.execute().unwrap();
    }

    #[test]
    fn test_check_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[[jobs]]\nname = \"x\"\ndispatcher = \"y\"\n").unwrap();

        let cmd = CheckCommand {
            config: file.path().display().to_string(),
            upcoming: 1,
            json: false,
        };
        assert!(cmd.execute().is_err());
    }
}
