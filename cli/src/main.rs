mod commands;
mod events;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use ta_core::domain::report::ThemeMode;
use ta_core::domain::settings::AppSettings;
use ta_core::infra::analyzer::HttpAnalyzer;
use ta_core::usecase::app_service::AppService;

use crate::events::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "tos-analyzer")]
#[command(version, about = "Analyze Terms of Service for unfair clauses")]
struct Cli {
    /// Document to upload (.pdf or .txt); takes precedence over --text
    #[arg(short, long)]
    file: Option<PathBuf>,
    /// Terms text to analyze; pass "-" to read it from stdin
    #[arg(short, long)]
    text: Option<String>,
    /// Analysis endpoint (overrides TA_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,
    /// Request timeout in seconds (overrides TA_REQUEST_TIMEOUT_SECS)
    #[arg(long)]
    timeout: Option<u64>,
    /// Display theme: light or dark (overrides TA_THEME)
    #[arg(long)]
    theme: Option<String>,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
    /// Disable colored clause output
    #[arg(long)]
    no_color: bool,
}

impl Cli {
    fn settings(&self) -> Result<AppSettings> {
        let mut settings = AppSettings::from_env();
        if let Some(endpoint) = &self.endpoint {
            settings.endpoint = endpoint.clone();
        }
        if let Some(secs) = self.timeout {
            settings.request_timeout_secs = Some(secs);
        }
        if let Some(theme) = &self.theme {
            settings.theme = theme
                .parse::<ThemeMode>()
                .map_err(anyhow::Error::msg)
                .context("invalid --theme")?;
        }
        Ok(settings)
    }

    fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text {
                color: !self.no_color && std::io::stdout().is_terminal(),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let settings = cli.settings()?;
    let analyzer = HttpAnalyzer::from_settings(&settings)?;
    let service = AppService::new(Arc::new(analyzer), settings);

    commands::load_input(&service, cli.file.as_deref(), cli.text.clone()).await?;

    let code = commands::analyze(
        &service,
        cli.output_format(),
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .await?;

    log::debug!("metrics: {}", serde_json::to_string(&service.get_metrics())?);

    Ok(ExitCode::from(code))
}
