//! Styled terminal output for the CLI surfaces.

use console::Style;

use crate::config::ServiceConfig;
use crate::error::ServiceError;
use crate::stats::StatsSnapshot;

pub struct ConsoleReport {
    heading: Style,
    green: Style,
    red: Style,
    yellow: Style,
}

impl ConsoleReport {
    pub fn new() -> Self {
        Self {
            heading: Style::new().cyan().bold(),
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// One-time banner when the worker starts.
    pub fn startup(&self, config: &ServiceConfig) {
        println!("{}", self.heading.apply_to("fiscald"));
        println!("  table:         {}", config.table_name);
        println!("  api url:       {}", config.api_url);
        println!("  poll interval: {}s", config.poll_interval_seconds);
        println!("  batch size:    {}", config.batch_size);
        if config.retry_tracking_enabled() {
            println!("  max retries:   {}", config.max_retries);
        } else {
            println!("  max retries:   {}", self.yellow.apply_to("untracked"));
        }
    }

    /// The effective configuration, rendered as TOML.
    pub fn print_config(&self, config: &ServiceConfig) -> Result<(), ServiceError> {
        println!("{}", self.heading.apply_to("─── Effective configuration ───"));
        print!("{}", toml::to_string_pretty(config)?);
        Ok(())
    }

    /// Final counters when the worker exits.
    pub fn shutdown(&self, snapshot: &StatsSnapshot) {
        println!();
        println!("{}", self.heading.apply_to("─── Processing summary ───"));
        println!("  processed: {}", snapshot.total_processed);
        println!("  {} {}", self.green.apply_to("success:"), snapshot.total_success);
        println!("  {} {}", self.yellow.apply_to("timeout:"), snapshot.total_timeout);
        println!("  {} {}", self.red.apply_to("failed:"), snapshot.total_failed);
        if let Some(message) = &snapshot.last_error_message {
            println!("  last error: {message}");
        }
    }
}

impl Default for ConsoleReport {
    fn default() -> Self {
        Self::new()
    }
}
