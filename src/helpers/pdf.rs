use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::error::Result;
use crate::helpers::export::InvoiceDocument;

/// Lays an exported invoice out as a document on disk.
pub trait DocumentRenderer {
    fn render(&self, document: &InvoiceDocument, path: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageSize {
    #[default]
    Letter,
    A4,
}

impl PageSize {
    /// Width and height in points.
    fn dimensions(self) -> (i64, i64) {
        match self {
            PageSize::Letter => (612, 792),
            PageSize::A4 => (595, 842),
        }
    }
}

const MARGIN: i64 = 73; // ~25.7 mm
const BODY_SIZE: i64 = 10;
const ROW_SIZE: i64 = 9;
const TITLE_SIZE: i64 = 16;
const LINE_HEIGHT: i64 = 15;
const DATE_FORMAT: &str = "%d/%m/%Y";

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

/// Entry table columns and their share of the text width.
const TABLE_COLUMNS: [(&str, f64); 5] = [
    ("#", 0.05),
    ("DESCRIPTION", 0.55),
    ("QTY (hrs)", 0.15),
    ("UNIT PRICE", 0.15),
    ("TOTAL", 0.10),
];

/// Renders invoices as PDF with the standard Helvetica fonts.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    pub page_size: PageSize,
}

impl DocumentRenderer for PdfRenderer {
    fn render(&self, document: &InvoiceDocument, path: &Path) -> Result<()> {
        let bytes = create_invoice_pdf(document, self.page_size)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, &bytes)?;
        info!(
            "Wrote invoice {} to {} ({} bytes)",
            document.invoice_id,
            path.display(),
            bytes.len()
        );
        Ok(())
    }
}

/// Collects drawing operations page by page, breaking pages as the cursor
/// reaches the bottom margin.
struct PageWriter {
    pages: Vec<Vec<Operation>>,
    width: i64,
    height: i64,
    y: i64,
}

impl PageWriter {
    fn new(page_size: PageSize) -> Self {
        let (width, height) = page_size.dimensions();
        Self {
            pages: vec![Vec::new()],
            width,
            height,
            y: height - MARGIN,
        }
    }

    fn text_width(&self) -> i64 {
        self.width - 2 * MARGIN
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn ensure_space(&mut self, needed: i64) {
        if self.y - needed < MARGIN {
            self.pages.push(Vec::new());
            self.y = self.height - MARGIN;
        }
    }

    fn text(&mut self, x: i64, font: &str, size: i64, text: &str) {
        let y = self.y;
        self.ops().extend([
            Operation::new("BT", vec![]),
            Operation::new(
                "Tf",
                vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(size)],
            ),
            Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn line(&mut self, font: &str, size: i64, text: &str) {
        self.ensure_space(LINE_HEIGHT);
        self.text(MARGIN, font, size, text);
        self.y -= LINE_HEIGHT;
    }

    fn rule(&mut self) {
        let (y, right) = (self.y + LINE_HEIGHT / 2, self.width - MARGIN);
        self.ops().extend([
            Operation::new("w", vec![Object::Integer(1)]),
            Operation::new("m", vec![Object::Integer(MARGIN), Object::Integer(y)]),
            Operation::new("l", vec![Object::Integer(right), Object::Integer(y)]),
            Operation::new("S", vec![]),
        ]);
    }

    fn gap(&mut self) {
        self.y -= LINE_HEIGHT / 2;
    }

    /// One row of cells at the table column offsets.
    fn row(&mut self, font: &str, size: i64, cells: &[&str]) {
        self.ensure_space(LINE_HEIGHT);
        let width = self.text_width() as f64;
        let mut x = MARGIN;
        for (cell, (_, share)) in cells.iter().zip(TABLE_COLUMNS) {
            self.text(x, font, size, &fit(cell, width * share, size));
            x += (width * share) as i64;
        }
        self.y -= LINE_HEIGHT;
    }

    /// Label on the left half, value right of it.
    fn pair(&mut self, font: &str, label: &str, value: &str) {
        self.ensure_space(LINE_HEIGHT);
        let offset = MARGIN + self.text_width() * 7 / 10;
        self.text(offset, font, BODY_SIZE, label);
        self.text(offset + self.text_width() * 15 / 100, font, BODY_SIZE, value);
        self.y -= LINE_HEIGHT;
    }
}

/// Cuts text to roughly fit `width` points at `size`.
fn fit(text: &str, width: f64, size: i64) -> String {
    // average Helvetica glyph is about half the font size wide
    let max_chars = (width / (size as f64 * 0.5)) as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

fn font(base: &str) -> lopdf::Dictionary {
    dictionary! {
        b"Type" => Object::Name(b"Font".to_vec()),
        b"Subtype" => Object::Name(b"Type1".to_vec()),
        b"BaseFont" => Object::Name(base.as_bytes().to_vec()),
    }
}

fn layout(document: &InvoiceDocument, page_size: PageSize) -> Vec<Vec<Operation>> {
    let mut w = PageWriter::new(page_size);
    let fields = &document.fields;

    w.line(BOLD, TITLE_SIZE, &format!("INVOICE {}", document.invoice_id));
    w.gap();

    let dates = [
        ("Date", fields.invoice_date),
        ("Due", fields.due_date),
        ("Period start", fields.period_start),
        ("Period end", fields.period_end),
    ];
    for (label, date) in dates {
        if let Some(date) = date {
            w.line(REGULAR, BODY_SIZE, &format!("{label}: {}", date.format(DATE_FORMAT)));
        }
    }
    w.gap();

    for line in fields.address.lines() {
        w.line(REGULAR, BODY_SIZE, &line);
    }
    w.gap();
    let bill_to = fields.bill_to.lines();
    if !bill_to.is_empty() {
        w.line(BOLD, BODY_SIZE, "BILL TO");
        for line in bill_to {
            w.line(REGULAR, BODY_SIZE, &line);
        }
        w.gap();
    }

    let header: Vec<&str> = TABLE_COLUMNS.iter().map(|(name, _)| *name).collect();
    w.row(BOLD, BODY_SIZE, &header);
    w.rule();
    for (i, entry) in document.entries.iter().enumerate() {
        let number = (i + 1).to_string();
        w.row(
            REGULAR,
            ROW_SIZE,
            &[
                number.as_str(),
                entry.description.as_str(),
                entry.quantity.as_str(),
                entry.unit_price.as_str(),
                entry.total.as_str(),
            ],
        );
    }
    w.rule();

    for row in &document.subtotals {
        w.pair(REGULAR, &row.label, &row.amount);
    }
    w.pair(BOLD, &document.total.label, &document.total.amount);
    w.gap();

    for (key, value) in &document.account {
        if !value.is_empty() {
            w.line(REGULAR, BODY_SIZE, &format!("{key}: {value}"));
        }
    }
    if !fields.remarks.is_empty() {
        w.gap();
        w.line(REGULAR, BODY_SIZE, &fields.remarks);
    }

    w.pages
}

/// Builds the PDF bytes for one invoice.
pub fn create_invoice_pdf(document: &InvoiceDocument, page_size: PageSize) -> Result<Vec<u8>> {
    let (width, height) = page_size.dimensions();
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(font("Helvetica"));
    let bold_id = doc.add_object(font("Helvetica-Bold"));
    let resources_id = doc.add_object(dictionary! {
        b"Font" => dictionary! {
            REGULAR => regular_id,
            BOLD => bold_id,
        },
    });

    let mut kids = Vec::new();
    for operations in layout(document, page_size) {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            b"Type" => Object::Name(b"Page".to_vec()),
            b"Parent" => pages_id,
            b"Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            b"Type" => Object::Name(b"Pages".to_vec()),
            b"Kids" => kids,
            b"Count" => count,
            b"Resources" => resources_id,
            b"MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(width),
                Object::Integer(height),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        b"Type" => Object::Name(b"Catalog".to_vec()),
        b"Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut output_buffer: Vec<u8> = Vec::new();
    if let Err(e) = doc.save_to(&mut output_buffer) {
        error!("Failed to convert PDF to bytes: {}", e);
        return Err(e.into());
    }
    info!(
        "Built invoice {} PDF with {} page(s), {} bytes",
        document.invoice_id,
        count,
        output_buffer.len()
    );
    Ok(output_buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::export::{AmountRow, EntryRow, Totals};
    use crate::models::config::{Address, InvoiceFields};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use tempfile::tempdir;

    fn document(rows: usize) -> InvoiceDocument {
        InvoiceDocument {
            invoice_id: "INV1".into(),
            entries: (0..rows)
                .map(|i| EntryRow {
                    description: format!(
                        "A-{i}: a (fairly) long description that will not fit the column at all"
                    ),
                    quantity: "1.00".into(),
                    unit_price: "40.00".into(),
                    total: "40.00".into(),
                })
                .collect(),
            subtotals: vec![
                AmountRow {
                    label: "SUBTOTAL".into(),
                    amount: "40.00".into(),
                },
                AmountRow {
                    label: "SHIPPING".into(),
                    amount: "0.00".into(),
                },
            ],
            total: AmountRow {
                label: "BALANCE DUE".into(),
                amount: "$ 40.00".into(),
            },
            account: vec![("Bank".into(), "Kiwi Bank".into())],
            fields: InvoiceFields {
                invoice_date: NaiveDate::from_ymd_opt(2024, 4, 2),
                address: Address {
                    name: "Jane Doe".into(),
                    ..Address::default()
                },
                remarks: "Thank you".into(),
                ..InvoiceFields::default()
            },
            totals: Totals {
                subtotal: Decimal::new(40, 0),
                tax: Decimal::ZERO,
                shipping: Decimal::ZERO,
                balance_due: Decimal::new(40, 0),
            },
        }
    }

    #[test]
    fn produces_a_loadable_single_page() {
        let bytes = create_invoice_pdf(&document(3), PageSize::Letter).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn long_tables_break_across_pages() {
        let bytes = create_invoice_pdf(&document(120), PageSize::A4).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() >= 3);
    }

    #[test]
    fn long_text_is_cut_to_the_column() {
        assert_eq!(fit("short", 100.0, 10), "short");
        let cut = fit(&"x".repeat(50), 50.0, 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn renderer_writes_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/invoice-INV1.pdf");
        PdfRenderer::default().render(&document(1), &path).unwrap();
        assert!(fs::metadata(&path).unwrap().len() > 0);
    }
}
