//! Sanction letter — a fixed single-page A4 template rendered with `printpdf`.
//!
//! A [`SanctionLetter`] is built once from an approved application and never
//! mutated.  [`SanctionLetter::write_to`] refuses to overwrite an existing
//! file, so every issued letter on disk is write-once.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use printpdf::{BuiltinFont, Mm, PdfDocument};
use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::money::group_thousands;

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const PT_TO_MM: f32 = 25.4 / 72.0;
/// One-inch margin, in points.
const MARGIN_PT: f32 = 72.0;

const TITLE: &str = "Personal Loan Sanction Letter";
const DISCLAIMER: &str =
    "Please note: This is a system-generated letter for demonstration purposes only.";

/// Terms of an approved loan, as printed on the letter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SanctionLetter {
    /// `SL-` followed by eight upper-case hex digits.
    pub reference: String,
    pub customer_name: String,
    pub phone: String,
    pub loan_amount: f64,
    pub tenure_months: u32,
    pub annual_rate_pct: f64,
    pub emi: f64,
    pub issued_on: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Title,
    Body,
}

/// One printed line and the vertical gap (points) that follows it.
struct Line {
    style: Style,
    text: String,
    advance_pt: f32,
}

impl SanctionLetter {
    pub fn new(
        customer_name: impl Into<String>,
        phone: impl Into<String>,
        loan_amount: f64,
        tenure_months: u32,
        annual_rate_pct: f64,
        emi: f64,
        issued_on: NaiveDate,
    ) -> Self {
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self {
            reference: format!("SL-{}", id[..8].to_ascii_uppercase()),
            customer_name: customer_name.into(),
            phone: phone.into(),
            loan_amount,
            tenure_months,
            annual_rate_pct,
            emi,
            issued_on,
        }
    }

    /// `sanction_<phone>_<reference>.pdf`
    pub fn file_name(&self) -> String {
        format!("sanction_{}_{}.pdf", self.phone, self.reference)
    }

    fn lines(&self) -> Vec<Line> {
        let body = |text: String, advance_pt: f32| Line { style: Style::Body, text, advance_pt };
        vec![
            Line { style: Style::Title, text: TITLE.to_string(), advance_pt: 24.0 },
            body(format!("Date: {}", self.issued_on.format("%Y-%m-%d")), 20.0),
            body(format!("Reference: {}", self.reference), 20.0),
            body(format!("To: {} ({})", self.customer_name, self.phone), 20.0),
            body("Subject: Sanction of Personal Loan".to_string(), 30.0),
            body(
                "We are pleased to inform you that your personal loan has been sanctioned."
                    .to_string(),
                16.0,
            ),
            body(format!("Sanction Amount: INR {}", group_thousands(self.loan_amount, 2)), 16.0),
            body(format!("Tenure: {} months", self.tenure_months), 16.0),
            body(format!("Interest Rate: {:.2}% p.a.", self.annual_rate_pct), 16.0),
            body(format!("Calculated EMI: INR {} (approx.)", group_thousands(self.emi, 2)), 16.0),
            body(String::new(), 16.0),
            body(DISCLAIMER.to_string(), 16.0),
        ]
    }

    /// The letter's text, one entry per printed line.
    pub fn text_lines(&self) -> Vec<String> {
        self.lines().into_iter().map(|l| l.text).collect()
    }

    /// Render the letter to PDF bytes.
    pub fn render(&self) -> Result<Vec<u8>, AppError> {
        let (doc, page, layer) =
            PdfDocument::new(TITLE, Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "letter");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| AppError::Sanction(format!("font: {e}")))?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| AppError::Sanction(format!("font: {e}")))?;
        let canvas = doc.get_page(page).get_layer(layer);

        let x = Mm(MARGIN_PT * PT_TO_MM);
        let mut y_pt = PAGE_HEIGHT_MM / PT_TO_MM - MARGIN_PT;
        for line in self.lines() {
            if !line.text.is_empty() {
                let (font, size) = match line.style {
                    Style::Title => (&bold, 16.0),
                    Style::Body => (&regular, 10.0),
                };
                canvas.use_text(line.text, size, x, Mm(y_pt * PT_TO_MM), font);
            }
            y_pt -= line.advance_pt;
        }

        doc.save_to_bytes()
            .map_err(|e| AppError::Sanction(format!("render failed: {e}")))
    }

    /// Render and write the letter into `dir`, creating `dir` if needed.
    /// Fails if a letter with the same file name already exists; a partly
    /// written file is removed again.  Blocking: call off the async workers.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, AppError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let bytes = self.render()?;
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| AppError::Sanction(format!("cannot create {}: {e}", path.display())))?;
        if let Err(e) = file.write_all(&bytes).and_then(|()| file.sync_all()) {
            drop(file);
            let _ = std::fs::remove_file(&path);
            return Err(AppError::Sanction(format!("cannot write {}: {e}", path.display())));
        }
        info!(reference = %self.reference, path = %path.display(), bytes = bytes.len(), "sanction letter issued");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter() -> SanctionLetter {
        SanctionLetter::new(
            "Aarav Sharma",
            "9876543210",
            500_000.0,
            36,
            12.0,
            16_607.15,
            NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        )
    }

    #[test]
    fn reference_has_expected_shape() {
        let l = letter();
        assert!(l.reference.starts_with("SL-"));
        assert_eq!(l.reference.len(), 11);
        assert_eq!(l.file_name(), format!("sanction_9876543210_{}.pdf", l.reference));
    }

    #[test]
    fn text_carries_terms() {
        let text = letter().text_lines().join("\n");
        assert!(text.starts_with(TITLE));
        assert!(text.contains("Date: 2026-03-01"));
        assert!(text.contains("To: Aarav Sharma (9876543210)"));
        assert!(text.contains("Sanction Amount: INR 500,000.00"));
        assert!(text.contains("Tenure: 36 months"));
        assert!(text.contains("Interest Rate: 12.00% p.a."));
        assert!(text.contains("Calculated EMI: INR 16,607.15 (approx.)"));
    }

    #[test]
    fn renders_pdf_bytes() {
        let bytes = letter().render().unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn write_is_create_once() {
        let dir = tempfile::tempdir().unwrap();
        let l = letter();
        let path = l.write_to(&dir.path().join("letters")).unwrap();
        assert!(path.exists());
        let err = l.write_to(&dir.path().join("letters")).unwrap_err();
        assert!(err.to_string().contains("sanction letter error"));
    }
}
