//! Report rendering
//!
//! Formats already-computed batch records into a paginated plain-text
//! document. Purely a formatting pass: every field it prints is guaranteed
//! populated and index-aligned by the store once a batch is completed.

use chrono::Utc;

use crate::core::constants::report;
use crate::store::Batch;

/// Renders batches into a paginated text report.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    rows_per_page: usize,
}

impl Default for ReportRenderer {
    fn default() -> Self {
        Self {
            rows_per_page: report::DEFAULT_ROWS_PER_PAGE,
        }
    }
}

impl ReportRenderer {
    pub fn new(rows_per_page: usize) -> Self {
        Self {
            rows_per_page: rows_per_page.max(1),
        }
    }

    /// Render the full report document for the given batches.
    pub fn render(&self, batches: &[Batch]) -> String {
        let mut doc = String::new();
        doc.push_str("Link Status Report\n");
        doc.push_str(&format!(
            "Generated: {}\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        ));
        doc.push('\n');

        if batches.is_empty() {
            doc.push_str("No batches found\n");
            return doc;
        }

        for batch in batches {
            self.render_batch(&mut doc, batch);
        }

        doc
    }

    fn render_batch(&self, doc: &mut String, batch: &Batch) {
        doc.push_str(&format!("=== Batch #{} ===\n", batch.id));
        doc.push_str(&format!(
            "Created: {}\n",
            batch.created_at.format("%Y-%m-%d %H:%M:%S")
        ));
        doc.push_str(&format!("Status:  {}\n", batch.status));

        if batch.results.is_empty() {
            doc.push('\n');
            return;
        }

        let pages = batch.results.chunks(self.rows_per_page).count();
        for (page, rows) in batch.results.chunks(self.rows_per_page).enumerate() {
            doc.push('\n');
            doc.push_str(&Self::header_row());
            for result in rows {
                let url = truncate(&result.url, report::URL_COLUMN_WIDTH);
                let checked_at = result.checked_at.to_rfc3339();
                let checked_at = truncate(&checked_at, report::CHECKED_AT_WIDTH);
                doc.push_str(&format!(
                    "{:<width$}  {:>6}  {:>9}  {}\n",
                    url,
                    result.status,
                    if result.available { "yes" } else { "no" },
                    checked_at,
                    width = report::URL_COLUMN_WIDTH
                ));
            }
            doc.push_str(&format!("-- Page {} of {} --\n", page + 1, pages));
        }
        doc.push('\n');
    }

    fn header_row() -> String {
        format!(
            "{:<width$}  {:>6}  {:>9}  {}\n",
            "URL",
            "Status",
            "Available",
            "Checked At",
            width = report::URL_COLUMN_WIDTH
        )
    }
}

/// Truncate to `width` characters, ellipsis included when cut.
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{kept}...")
}
