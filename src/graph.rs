#![cfg(not(tarpaulin_include))]
use plotters::element::Pie;
use plotters::prelude::*;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::error::Error;
use std::io::Cursor;

use crate::error::{ReportError, Result};
use crate::record::month_label;
use crate::report::SalesReport;
use crate::settings::ChartStyle;
use crate::summary::{CategoryTotals, MonthlyTotals, PeriodSummary};

/// Charts included in a sales report
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphType {
    /// Bar per year - compares yearly totals
    Bar,

    /// One line per year across the twelve months
    Line,

    /// Share of each category in the total
    Pie,
}

impl GraphType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "bar" => Some(GraphType::Bar),
            "line" => Some(GraphType::Line),
            "pie" => Some(GraphType::Pie),
            _ => None,
        }
    }
}

/// PNG images of the three report charts
#[derive(Clone, Debug)]
pub struct ReportCharts {
    pub bar: Vec<u8>,
    pub line: Vec<u8>,
    /// Absent when no category has a positive total
    pub pie: Option<Vec<u8>>,
}

impl ReportCharts {
    /// Images in the order they appear in the PDF
    pub fn images(&self) -> Vec<&[u8]> {
        let mut images = vec![self.bar.as_slice(), self.line.as_slice()];
        if let Some(pie) = &self.pie {
            images.push(pie.as_slice());
        }
        images
    }
}

/// Render every chart of a report
pub fn render_charts(report: &SalesReport, style: &ChartStyle) -> Result<ReportCharts> {
    Ok(ReportCharts {
        bar: yearly_bar_chart(&report.yearly, style)?,
        line: monthly_line_chart(&report.monthly, style)?,
        pie: category_pie_chart(&report.categories, style)?,
    })
}

/// Render a single chart of a report
///
/// # Returns
/// * PNG bytes, or `None` for a pie chart with nothing positive to show
pub fn create_graph(
    report: &SalesReport,
    graph_type: GraphType,
    style: &ChartStyle,
) -> Result<Option<Vec<u8>>> {
    match graph_type {
        GraphType::Bar => yearly_bar_chart(&report.yearly, style).map(Some),
        GraphType::Line => monthly_line_chart(&report.monthly, style).map(Some),
        GraphType::Pie => category_pie_chart(&report.categories, style),
    }
}

/// Bar chart of yearly totals
pub fn yearly_bar_chart(summary: &[PeriodSummary], style: &ChartStyle) -> Result<Vec<u8>> {
    render(style, |buffer| draw_yearly_bars(summary, style, buffer))
}

/// Line chart of monthly totals, one series per year
pub fn monthly_line_chart(monthly: &MonthlyTotals, style: &ChartStyle) -> Result<Vec<u8>> {
    render(style, |buffer| draw_monthly_lines(monthly, style, buffer))
}

/// Pie chart of category totals
///
/// Categories whose total is zero or negative cannot be drawn as a slice and
/// are left out.
pub fn category_pie_chart(totals: &CategoryTotals, style: &ChartStyle) -> Result<Option<Vec<u8>>> {
    let slices: Vec<(String, f64)> = totals
        .iter()
        .map(|(name, total)| (name.clone(), to_f64(*total)))
        .filter(|(_, value)| *value > 0.0)
        .collect();

    if slices.is_empty() {
        log::debug!("no positive category totals, skipping pie chart");
        return Ok(None);
    }

    render(style, |buffer| draw_category_pie(&slices, style, buffer)).map(Some)
}

/// Draw into an RGB buffer sized from `style` and encode it as PNG
fn render<F>(style: &ChartStyle, draw: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut [u8]) -> std::result::Result<(), Box<dyn Error>>,
{
    let mut buffer = vec![0u8; style.width as usize * style.height as usize * 3];
    draw(buffer.as_mut_slice()).map_err(|e| ReportError::Chart(e.to_string()))?;
    encode_png(buffer, style.width, style.height).map_err(|e| ReportError::Chart(e.to_string()))
}

fn encode_png(buffer: Vec<u8>, width: u32, height: u32) -> std::result::Result<Vec<u8>, Box<dyn Error>> {
    let image = image::RgbImage::from_raw(width, height, buffer)
        .ok_or("chart buffer does not match its dimensions")?;
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut png), image::ImageOutputFormat::Png)?;
    Ok(png)
}

fn draw_yearly_bars(
    summary: &[PeriodSummary],
    style: &ChartStyle,
    buffer: &mut [u8],
) -> std::result::Result<(), Box<dyn Error>> {
    let root = BitMapBackend::with_buffer(buffer, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let years: Vec<i32> = summary.iter().map(|s| s.year).collect();
    let values: Vec<f64> = summary.iter().map(|s| to_f64(s.total)).collect();
    let count = values.len().max(1);

    let mut chart = ChartBuilder::on(&root)
        .caption("Sales Comparison by Year", caption_font(style))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(70)
        .build_cartesian_2d(-0.5f64..(count as f64 - 0.5), value_range(&values))?;

    let year_label = |x: &f64| {
        let idx = x.round();
        if (x - idx).abs() > 1e-6 || idx < 0.0 {
            return String::new();
        }
        years
            .get(idx as usize)
            .map(|y| y.to_string())
            .unwrap_or_default()
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(count)
        .x_label_formatter(&year_label)
        .x_desc("Year")
        .y_desc("Total Sales")
        .label_style(label_font(style))
        .draw()?;

    chart.draw_series(values.iter().enumerate().map(|(i, value)| {
        let x = i as f64;
        Rectangle::new([(x - 0.35, 0.0), (x + 0.35, *value)], rgb(style, i).filled())
    }))?;

    root.present()?;
    Ok(())
}

fn draw_monthly_lines(
    monthly: &MonthlyTotals,
    style: &ChartStyle,
    buffer: &mut [u8],
) -> std::result::Result<(), Box<dyn Error>> {
    let root = BitMapBackend::with_buffer(buffer, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let series = monthly.series();
    let values: Vec<f64> = monthly.iter().map(|(_, total)| to_f64(*total)).collect();

    let mut chart = ChartBuilder::on(&root)
        .caption("Monthly Sales Trend", caption_font(style))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(70)
        .build_cartesian_2d(0.5f64..12.5f64, value_range(&values))?;

    let month_tick = |x: &f64| {
        let m = x.round();
        if (x - m).abs() > 1e-6 || !(1.0..=12.0).contains(&m) {
            return String::new();
        }
        month_label(m as u32).to_string()
    };

    chart
        .configure_mesh()
        .x_labels(12)
        .x_label_formatter(&month_tick)
        .x_desc("Month")
        .y_desc("Sales")
        .label_style(label_font(style))
        .draw()?;

    for (i, (year, points)) in series.iter().enumerate() {
        let color = rgb(style, i);
        let points: Vec<(f64, f64)> = points
            .iter()
            .map(|(month, total)| (*month as f64, to_f64(*total)))
            .collect();

        chart
            .draw_series(LineSeries::new(points.clone(), color.stroke_width(2)))?
            .label(year.to_string())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));

        chart.draw_series(points.into_iter().map(|p| Circle::new(p, 4, color.filled())))?;
    }

    chart
        .configure_series_labels()
        .label_font(label_font(style))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_category_pie(
    slices: &[(String, f64)],
    style: &ChartStyle,
    buffer: &mut [u8],
) -> std::result::Result<(), Box<dyn Error>> {
    let root = BitMapBackend::with_buffer(buffer, (style.width, style.height)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled("Sales Distribution by Category", caption_font(style))?;

    let (width, height) = root.dim_in_pixel();
    let center = (width as i32 / 2, height as i32 / 2);
    let radius = width.min(height) as f64 * 0.38;

    let sizes: Vec<f64> = slices.iter().map(|(_, value)| *value).collect();
    let labels: Vec<&str> = slices.iter().map(|(name, _)| name.as_str()).collect();
    let colors: Vec<RGBColor> = (0..slices.len()).map(|i| rgb(style, i)).collect();

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.start_angle(140.0);
    pie.label_style(label_font(style));
    pie.percentages(label_font(style).color(&WHITE));
    root.draw(&pie)?;

    root.present()?;
    Ok(())
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Y range covering every value and zero, with some headroom
fn value_range(values: &[f64]) -> std::ops::Range<f64> {
    let max = values.iter().copied().fold(0.0, f64::max);
    let min = values.iter().copied().fold(0.0, f64::min);
    let span = (max - min).max(1.0);
    let low = if min < 0.0 { min - span * 0.1 } else { 0.0 };
    low..max + span * 0.1
}

fn rgb(style: &ChartStyle, index: usize) -> RGBColor {
    let [r, g, b] = style.color(index);
    RGBColor(r, g, b)
}

fn caption_font(style: &ChartStyle) -> TextStyle<'_> {
    (style.font_family.as_str(), style.caption_size as f64).into_font().into()
}

fn label_font(style: &ChartStyle) -> TextStyle<'_> {
    (style.font_family.as_str(), style.label_size as f64).into_font().into()
}
