/*!
# Sales Report

Turns an uploaded spreadsheet of sales records into a yearly summary with
growth figures, three charts and a downloadable PDF.

## Overview

A user uploads a workbook (or CSV) holding one sale per row. The rows are
optionally narrowed down by client and category, then aggregated per year,
per month and per category. The yearly summary, a bar chart of yearly
totals, a line chart of monthly totals per year and a pie chart of category
totals are bundled into a PDF.

## Input

The sheet's first row is a header naming at least four columns. By default
these are the Spanish headers of the usual sales export:

| Column      | Meaning                              |
|-------------|--------------------------------------|
| `fecha`     | sale date                            |
| `venta`     | amount, may be negative              |
| `cliente`   | client identifier                    |
| `categoria` | category identifier                  |

The names can be changed through [`settings::Settings::columns`].

## Modules

- **record**: `SaleRecord` and parsing of raw date/amount text
- **summary**: yearly summary with growth, monthly and category totals
- **filter**: client/category selection applied before aggregation
- **loader**: workbook and CSV import
- **report**: filter + aggregate pipeline and the summary lines
- **settings**: configuration file and environment overrides
- **error**: `ReportError`, the error type of every stage
- **graph**: bar, line and pie charts as PNG (feature `web`)
- **downloader**: PDF, CSV and XLSX exports
- **app**: HTTP routes for the upload form (feature `web`)

## REST API Endpoints

- `GET /` - Upload form
- `POST /api/preview` - Filter options, first rows and yearly summary
- `POST /api/chart/{bar|line|pie}` - One chart as PNG
- `POST /api/export?format=csv|xlsx` - Yearly summary download
- `POST /api/report` - PDF download
*/

pub mod downloader;
pub mod error;
pub mod filter;
pub mod loader;
pub mod record;
pub mod report;
pub mod settings;
pub mod summary;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;

pub use error::{ReportError, Result};
pub use filter::RecordFilter;
pub use record::SaleRecord;
pub use report::SalesReport;
pub use settings::Settings;
pub use summary::{Growth, PeriodSummary, group_by_category, group_by_month, summarize_by_year};
