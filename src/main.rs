use clap::Parser;
use std::error::Error;
use std::path::PathBuf;

use sales_report::loader::load_records;
use sales_report::settings::load_settings;
use sales_report::{RecordFilter, SalesReport, downloader};

/// Summarize a sales workbook per year
#[derive(Parser, Debug)]
#[command(name = "sales-report", version, about)]
struct Cli {
    /// Workbook (.xlsx, .xls, .ods) or CSV file with one sale per row
    #[arg(short, long)]
    input: PathBuf,

    /// Keep only these clients (repeatable)
    #[arg(long = "client")]
    clients: Vec<String>,

    /// Keep only these categories (repeatable)
    #[arg(long = "category")]
    categories: Vec<String>,

    /// Write the yearly summary as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the PDF report with charts
    #[cfg(feature = "web")]
    #[arg(long)]
    pdf: Option<PathBuf>,

    /// Configuration file, defaults to ./config.toml when present
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    let records = load_records(&cli.input, &settings.columns)?;
    let filter = RecordFilter::new()
        .with_clients(cli.clients)
        .with_categories(cli.categories);
    let report = SalesReport::build(&records, &filter)?;

    for line in report.summary_lines() {
        println!("{}", line);
    }

    if let Some(path) = &cli.csv {
        std::fs::write(path, downloader::summary_to_csv(&report.yearly)?)?;
        log::info!("wrote summary to {}", path.display());
    }

    #[cfg(feature = "web")]
    if let Some(path) = &cli.pdf {
        std::fs::write(path, report.render_pdf(&settings)?)?;
        log::info!("wrote report to {}", path.display());
    }

    Ok(())
}
