#![cfg(not(tarpaulin_include))]

use sales_report::app;
use sales_report::settings::load_settings;

/// Main entry point for the web application
///
/// Reads `config.toml` from the working directory when present, applies
/// `SALES_REPORT__*` environment overrides and serves the upload form.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = load_settings(None)?;
    app::run(settings).await
}
