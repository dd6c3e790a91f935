use crate::error::{ReportError, Result};
use crate::summary::{Growth, PeriodSummary, format_2dp};

const SUMMARY_HEADER: [&str; 3] = ["year", "total", "growth"];

fn growth_cell(growth: &Growth) -> String {
    match growth.percent() {
        Some(pct) => format_2dp(pct),
        None => "n/a".to_string(),
    }
}

/// Convert the yearly summary to CSV
///
/// Columns are `year,total,growth`; totals and growth carry two decimals and
/// undefined growth is written as `n/a`.
///
/// # Examples
/// ```
/// use sales_report::downloader::summary_to_csv;
///
/// let csv = summary_to_csv(&[]).unwrap();
/// assert_eq!(csv, "year,total,growth\n");
/// ```
pub fn summary_to_csv(summary: &[PeriodSummary]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| ReportError::Export(e.to_string());
    writer.write_record(SUMMARY_HEADER).map_err(csv_err)?;
    for row in summary {
        writer
            .write_record([
                row.year.to_string(),
                format_2dp(row.total),
                growth_cell(&row.growth),
            ])
            .map_err(csv_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ReportError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| ReportError::Export(e.to_string()))
}

/// Convert the yearly summary to XLSX format
///
/// Same columns as [`summary_to_csv`], with years, totals and growth written
/// as numbers.
#[cfg(feature = "web")]
pub fn summary_to_xlsx(summary: &[PeriodSummary]) -> Result<Vec<u8>> {
    use rust_decimal::prelude::ToPrimitive;
    use rust_xlsxwriter::{Workbook, Worksheet};

    let xlsx_err = |e: rust_xlsxwriter::XlsxError| ReportError::Export(e.to_string());

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();
    worksheet.set_name("Summary").map_err(xlsx_err)?;

    for (c, name) in SUMMARY_HEADER.iter().enumerate() {
        worksheet.write_string(0, c as u16, *name).map_err(xlsx_err)?;
    }

    for (i, row) in summary.iter().enumerate() {
        let r = i as u32 + 1;
        worksheet.write_number(r, 0, row.year as f64).map_err(xlsx_err)?;
        worksheet
            .write_number(r, 1, row.total.to_f64().unwrap_or(0.0))
            .map_err(xlsx_err)?;
        match row.growth.percent().and_then(|p| p.to_f64()) {
            Some(pct) => worksheet.write_number(r, 2, pct).map_err(xlsx_err)?,
            None => worksheet.write_string(r, 2, "n/a").map_err(xlsx_err)?,
        };
    }

    workbook.push_worksheet(worksheet);
    workbook.save_to_buffer().map_err(xlsx_err)
}

#[cfg(feature = "web")]
const PAGE_WIDTH_MM: f32 = 210.0;
#[cfg(feature = "web")]
const PAGE_HEIGHT_MM: f32 = 297.0;
#[cfg(feature = "web")]
const MARGIN_MM: f32 = 15.0;
#[cfg(feature = "web")]
const LINE_HEIGHT_MM: f32 = 10.0;
#[cfg(feature = "web")]
const PT_TO_MM: f32 = 0.3528;

/// Assemble the PDF report
///
/// Lays out an A4 document with a bold centred title, one line per entry of
/// `lines`, then each PNG of `images` scaled to `settings.image_width_mm`.
/// Content that does not fit continues on a new page.
///
/// # Errors
/// * `ReportError::Export` if an image cannot be decoded or the document
///   cannot be written
#[cfg(feature = "web")]
pub fn to_pdf(
    settings: &crate::settings::ReportSettings,
    lines: &[String],
    images: &[&[u8]],
) -> Result<Vec<u8>> {
    use printpdf::{BuiltinFont, Image, ImageTransform, Mm, PdfDocument};

    let pdf_err = |e: printpdf::Error| ReportError::Export(e.to_string());

    let (doc, page, layer) = PdfDocument::new(
        settings.title.as_str(),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold).map_err(pdf_err)?;
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
    let mut current = doc.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT_MM - MARGIN_MM - LINE_HEIGHT_MM;

    // builtin fonts carry no metrics here; half an em per glyph is close enough
    let title_width = settings.title.chars().count() as f32 * 16.0 * 0.5 * PT_TO_MM;
    let title_x = ((PAGE_WIDTH_MM - title_width) / 2.0).max(MARGIN_MM);
    current.use_text(settings.title.as_str(), 16.0, Mm(title_x), Mm(y), &bold);
    y -= LINE_HEIGHT_MM * 2.0;

    for line in lines {
        if y < MARGIN_MM {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            current = doc.get_page(page).get_layer(layer);
            y = PAGE_HEIGHT_MM - MARGIN_MM - LINE_HEIGHT_MM;
        }
        current.use_text(line.as_str(), 12.0, Mm(MARGIN_MM), Mm(y), &regular);
        y -= LINE_HEIGHT_MM;
    }
    y -= LINE_HEIGHT_MM;

    let width_mm = settings.image_width_mm;
    for bytes in images {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| ReportError::Export(format!("unreadable chart image: {}", e)))?;
        let rgb = image::DynamicImage::ImageRgb8(decoded.to_rgb8());
        let (px_width, px_height) = (rgb.width() as f32, rgb.height() as f32);
        let dpi = px_width * 25.4 / width_mm;
        let height_mm = px_height * width_mm / px_width;

        if y - height_mm < MARGIN_MM {
            let (page, layer) = doc.add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            current = doc.get_page(page).get_layer(layer);
            y = PAGE_HEIGHT_MM - MARGIN_MM;
        }

        Image::from_dynamic_image(&rgb).add_to_layer(
            current.clone(),
            ImageTransform {
                translate_x: Some(Mm((PAGE_WIDTH_MM - width_mm) / 2.0)),
                translate_y: Some(Mm(y - height_mm)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
        y -= height_mm + 5.0;
    }

    doc.save_to_bytes().map_err(pdf_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn summary() -> Vec<PeriodSummary> {
        vec![
            PeriodSummary {
                year: 2022,
                total: Decimal::ZERO,
                growth: Growth::Percent(Decimal::ZERO),
            },
            PeriodSummary {
                year: 2023,
                total: Decimal::new(15050, 2),
                growth: Growth::Undefined,
            },
            PeriodSummary {
                year: 2024,
                total: Decimal::new(30100, 2),
                growth: Growth::Percent(Decimal::from(100)),
            },
        ]
    }

    #[test]
    fn summary_csv_rows() {
        let csv = summary_to_csv(&summary()).unwrap();
        assert_eq!(
            csv,
            "year,total,growth\n2022,0.00,0.00\n2023,150.50,n/a\n2024,301.00,100.00\n"
        );
    }

    #[cfg(feature = "web")]
    #[test]
    fn summary_xlsx_is_a_zip_container() {
        let bytes = summary_to_xlsx(&summary()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[cfg(feature = "web")]
    #[test]
    fn pdf_embeds_images_and_lines() {
        let chart = image::RgbImage::from_pixel(120, 60, image::Rgb([30, 144, 255]));
        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(chart)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageOutputFormat::Png)
            .unwrap();

        let lines: Vec<String> = summary().iter().map(PeriodSummary::report_line).collect();
        let settings = crate::settings::ReportSettings::default();
        let pdf = to_pdf(&settings, &lines, &[png.as_slice(), png.as_slice(), png.as_slice()]).unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }

    #[cfg(feature = "web")]
    #[test]
    fn pdf_rejects_undecodable_images() {
        let settings = crate::settings::ReportSettings::default();
        let err = to_pdf(&settings, &[], &[b"not an image".as_slice()]).unwrap_err();
        assert_eq!(err.kind(), "export");
    }
}
