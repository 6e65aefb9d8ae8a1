//! PDF text extraction.
//!
//! Two interchangeable strategies reduce a PDF to one ordered text string,
//! selected by `extraction.strategy`:
//!
//! - **[`LocalPdfExtractor`]**: parses the PDF in-process page by page
//!   (lopdf) and normalizes column-aligned lines into tab-separated rows.
//!   Falls back to whole-document extraction (pdf-extract) when per-page
//!   parsing fails or finds no text.
//! - **[`LayoutExtractor`]**: Azure Document Intelligence `prebuilt-layout`.
//!   Detected tables are rendered as tab-separated rows under a
//!   `---- Table #N ----` marker, followed by the page text.
//!
//! Extraction failures are per document: callers report them and move on
//! to the next file.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use docqa_core::models::Document;
use docqa_core::{DocQaError, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::{Config, ExtractionStrategy};

/// PDF files must carry this header within their first KiB.
const PDF_MAGIC: &[u8] = b"%PDF-";
const PDF_HEADER_WINDOW: usize = 1024;

pub const TABLE_MARKER_PREFIX: &str = "---- Table #";
pub const TEXT_MARKER: &str = "---- Extracted Text ----";

/// Converts PDF bytes into plain UTF-8 text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Strategy name for logs (`"local"`, `"layout"`).
    fn name(&self) -> &str;

    async fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// Build the extractor selected in configuration.
///
/// The layout strategy reads its endpoint and key from the credentials
/// resolved at startup.
pub fn create_extractor(config: &Config) -> Result<Box<dyn TextExtractor>> {
    match config.extraction.strategy {
        ExtractionStrategy::Local => Ok(Box::new(LocalPdfExtractor)),
        ExtractionStrategy::Layout => Ok(Box::new(LayoutExtractor::new(config)?)),
    }
}

/// Read a PDF from disk and extract it into a [`Document`] named after the
/// file.
pub async fn load_document(extractor: &dyn TextExtractor, path: &Path) -> Result<Document> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DocQaError::Extraction(format!("cannot read {}: {}", path.display(), e)))?;

    info!(
        "Extracting {} ({} bytes) with {} strategy",
        name,
        bytes.len(),
        extractor.name()
    );
    let text = extractor
        .extract(&bytes)
        .await
        .map_err(|e| match e {
            DocQaError::Extraction(msg) => DocQaError::Extraction(format!("{}: {}", name, msg)),
            other => other,
        })?;
    debug!("Extracted {} characters from {}", text.chars().count(), name);

    Ok(Document::new(name, text))
}

/// Reject input that is not a PDF before handing it to a parser.
pub fn ensure_pdf(bytes: &[u8]) -> Result<()> {
    let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    if window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
        Ok(())
    } else {
        Err(DocQaError::Extraction(
            "input is not a PDF (missing %PDF- header)".to_string(),
        ))
    }
}

// ============ Local strategy ============

/// In-process PDF text extraction.
pub struct LocalPdfExtractor;

#[async_trait]
impl TextExtractor for LocalPdfExtractor {
    fn name(&self) -> &str {
        "local"
    }

    async fn extract(&self, bytes: &[u8]) -> Result<String> {
        ensure_pdf(bytes)?;
        let bytes = bytes.to_vec();
        // Parsing is CPU-bound and pdf-extract can panic on malformed input;
        // a blocking task contains both.
        tokio::task::spawn_blocking(move || extract_local(&bytes))
            .await
            .map_err(|e| DocQaError::Extraction(format!("PDF parser crashed: {}", e)))?
    }
}

fn extract_local(bytes: &[u8]) -> Result<String> {
    match extract_pages(bytes) {
        Ok(pages) if pages.iter().any(|p| !p.trim().is_empty()) => {
            debug!("lopdf extracted {} pages", pages.len());
            Ok(pages
                .iter()
                .map(|page| tabulate_page(page))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Ok(_) => {
            debug!("lopdf found no text, falling back to pdf-extract");
            extract_whole(bytes)
        }
        Err(e) => {
            warn!("Per-page PDF parsing failed ({}), falling back to pdf-extract", e);
            extract_whole(bytes)
        }
    }
}

fn extract_pages(bytes: &[u8]) -> std::result::Result<Vec<String>, lopdf::Error> {
    let doc = lopdf::Document::load_mem(bytes)?;
    let mut pages = Vec::new();
    for page_number in doc.get_pages().keys() {
        pages.push(doc.extract_text(&[*page_number])?);
    }
    Ok(pages)
}

fn extract_whole(bytes: &[u8]) -> Result<String> {
    pdf_extract::extract_text_from_mem(bytes)
        .map(|text| tabulate_page(&text))
        .map_err(|e| DocQaError::Extraction(format!("PDF extraction failed: {}", e)))
}

/// Normalize every line of a page with [`tabulate_line`].
pub fn tabulate_page(page: &str) -> String {
    page.lines().map(tabulate_line).collect::<Vec<_>>().join("\n")
}

/// Render a column-aligned line as a tab-separated row.
///
/// Cells are separated by tabs or runs of two or more spaces. Lines with a
/// single cell are returned with trailing whitespace removed.
pub fn tabulate_line(line: &str) -> String {
    let cells = split_cells(line.trim());
    if cells.len() >= 2 {
        cells.join("\t")
    } else {
        line.trim_end().to_string()
    }
}

fn split_cells(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let is_gap = |i: usize| {
        bytes[i] == b'\t' || (bytes[i] == b' ' && i + 1 < bytes.len() && bytes[i + 1] == b' ')
    };

    let mut cells = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        if is_gap(i) {
            let cell = line[start..i].trim();
            if !cell.is_empty() {
                cells.push(cell);
            }
            while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
                i += 1;
            }
            start = i;
        } else {
            i += 1;
        }
    }
    let cell = line[start..].trim();
    if !cell.is_empty() {
        cells.push(cell);
    }
    cells
}

// ============ Layout strategy ============

/// Azure Document Intelligence `prebuilt-layout` client.
pub struct LayoutExtractor {
    client: reqwest::Client,
    endpoint: String,
    key: String,
    api_version: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl LayoutExtractor {
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config
            .credentials
            .azure_endpoint()?
            .trim_end_matches('/')
            .to_string();
        let key = config.credentials.azure_key()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.extraction.timeout_secs))
            .build()
            .map_err(|e| DocQaError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            key,
            api_version: config.extraction.api_version.clone(),
            poll_interval: Duration::from_millis(config.extraction.poll_interval_ms),
            max_polls: config.extraction.max_polls,
        })
    }

    fn analyze_url(&self) -> String {
        format!(
            "{}/documentintelligence/documentModels/prebuilt-layout:analyze?api-version={}",
            self.endpoint, self.api_version
        )
    }

    async fn submit(&self, bytes: &[u8]) -> Result<String> {
        let body = serde_json::json!({
            "base64Source": base64::engine::general_purpose::STANDARD.encode(bytes),
        });

        let response = self
            .client
            .post(self.analyze_url())
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DocQaError::Extraction(format!("layout service unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(DocQaError::Extraction(format!(
                "layout service error {}: {}",
                status, body_text
            )));
        }

        response
            .headers()
            .get("operation-location")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                DocQaError::Extraction("layout service returned no Operation-Location".to_string())
            })
    }

    async fn poll(&self, operation_url: &str) -> Result<AnalyzeResult> {
        for attempt in 0..self.max_polls {
            if attempt > 0 {
                tokio::time::sleep(self.poll_interval).await;
            }

            let response = self
                .client
                .get(operation_url)
                .header("Ocp-Apim-Subscription-Key", &self.key)
                .send()
                .await
                .map_err(|e| DocQaError::Extraction(format!("layout poll failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body_text = response.text().await.unwrap_or_default();
                return Err(DocQaError::Extraction(format!(
                    "layout poll error {}: {}",
                    status, body_text
                )));
            }

            let operation: AnalyzeOperation = response
                .json()
                .await
                .map_err(|e| DocQaError::Extraction(format!("invalid layout response: {}", e)))?;

            match operation.status.as_str() {
                "succeeded" => return Ok(operation.analyze_result.unwrap_or_default()),
                "failed" | "canceled" => {
                    return Err(DocQaError::Extraction(format!(
                        "layout analysis {}: {}",
                        operation.status,
                        operation.error.map(|e| e.to_string()).unwrap_or_default()
                    )))
                }
                other => debug!("Layout analysis {} (poll {})", other, attempt + 1),
            }
        }

        Err(DocQaError::Extraction(format!(
            "layout analysis did not finish after {} polls",
            self.max_polls
        )))
    }
}

#[async_trait]
impl TextExtractor for LayoutExtractor {
    fn name(&self) -> &str {
        "layout"
    }

    async fn extract(&self, bytes: &[u8]) -> Result<String> {
        ensure_pdf(bytes)?;
        let operation_url = self.submit(bytes).await?;
        debug!("Layout analysis submitted: {}", operation_url);
        let result = self.poll(&operation_url).await?;
        Ok(render_layout(&result))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// The subset of an `analyzeResult` payload used for rendering.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default)]
    pub pages: Vec<LayoutPage>,
    #[serde(default)]
    pub tables: Vec<LayoutTable>,
}

#[derive(Debug, Deserialize, Default)]
pub struct LayoutPage {
    #[serde(default)]
    pub lines: Vec<LayoutLine>,
    #[serde(default)]
    pub words: Vec<LayoutWord>,
}

#[derive(Debug, Deserialize)]
pub struct LayoutLine {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub spans: Vec<Span>,
}

#[derive(Debug, Deserialize)]
pub struct LayoutWord {
    pub content: String,
    pub span: Span,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Span {
    pub offset: usize,
    pub length: usize,
}

impl Span {
    fn contains(&self, other: &Span) -> bool {
        other.offset >= self.offset && other.offset + other.length <= self.offset + self.length
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutTable {
    pub row_count: usize,
    pub column_count: usize,
    #[serde(default)]
    pub cells: Vec<LayoutCell>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutCell {
    pub row_index: usize,
    pub column_index: usize,
    #[serde(default)]
    pub content: String,
}

/// Render tables first, then page text.
///
/// Each line is rebuilt from the words that fall inside its spans; a line
/// without matching words keeps its own content. Pages are separated by a
/// blank line.
pub fn render_layout(result: &AnalyzeResult) -> String {
    let mut out: Vec<String> = Vec::new();

    for (i, table) in result.tables.iter().enumerate() {
        out.push(format!("{}{} ----", TABLE_MARKER_PREFIX, i + 1));
        let mut grid = vec![vec![String::new(); table.column_count]; table.row_count];
        for cell in &table.cells {
            if let Some(slot) = grid
                .get_mut(cell.row_index)
                .and_then(|row| row.get_mut(cell.column_index))
            {
                slot.clone_from(&cell.content);
            }
        }
        for row in grid {
            out.push(row.join("\t"));
        }
    }

    let pages: Vec<String> = result
        .pages
        .iter()
        .map(render_page)
        .filter(|p| !p.is_empty())
        .collect();
    if !pages.is_empty() {
        out.push(TEXT_MARKER.to_string());
        out.push(pages.join("\n\n"));
    }

    out.join("\n")
}

fn render_page(page: &LayoutPage) -> String {
    page.lines
        .iter()
        .map(|line| {
            let words: Vec<&str> = page
                .words
                .iter()
                .filter(|w| line.spans.iter().any(|s| s.contains(&w.span)))
                .map(|w| w.content.as_str())
                .collect();
            if words.is_empty() {
                line.content.clone()
            } else {
                words.join(" ")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    /// Minimal single-page PDF showing `phrase`, with correct xref offsets.
    pub(crate) fn minimal_pdf(phrase: &str) -> Vec<u8> {
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let o1 = out.len();
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        let o2 = out.len();
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        let o3 = out.len();
        out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
        let o4 = out.len();
        out.extend_from_slice(
            format!(
                "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
                stream.len(),
                stream
            )
            .as_bytes(),
        );
        let o5 = out.len();
        out.extend_from_slice(
            b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
        );
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 6\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for offset in [o1, o2, o3, o4, o5] {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    #[test]
    fn non_pdf_input_rejected() {
        let err = ensure_pdf(b"PK\x03\x04 not a pdf").unwrap_err();
        assert!(matches!(err, DocQaError::Extraction(_)));
        assert!(ensure_pdf(b"%PDF-1.7\n...").is_ok());
    }

    #[tokio::test]
    async fn local_extractor_reads_minimal_pdf() {
        let text = LocalPdfExtractor
            .extract(&minimal_pdf("uptime guarantee"))
            .await
            .unwrap();
        assert!(text.contains("uptime guarantee"), "got: {:?}", text);
    }

    #[tokio::test]
    async fn local_extractor_rejects_garbage() {
        let err = LocalPdfExtractor.extract(b"not a pdf").await.unwrap_err();
        assert!(matches!(err, DocQaError::Extraction(_)));
    }

    #[test]
    fn tabulate_aligned_columns() {
        assert_eq!(tabulate_line("Metric     Target    Penalty"), "Metric\tTarget\tPenalty");
        assert_eq!(tabulate_line("Uptime\t99.9%\t5%"), "Uptime\t99.9%\t5%");
        assert_eq!(tabulate_line("  plain sentence here.  "), "  plain sentence here.");
        assert_eq!(
            tabulate_page("Heading\nA  B\n"),
            "Heading\nA\tB"
        );
    }

    #[test]
    fn tabulate_keeps_multibyte_cells() {
        assert_eq!(tabulate_line("Délai  réponse   4 h"), "Délai\tréponse\t4 h");
    }

    fn sample_result() -> AnalyzeResult {
        serde_json::from_value(serde_json::json!({
            "pages": [
                {
                    "words": [
                        {"content": "Service", "span": {"offset": 0, "length": 7}},
                        {"content": "Agreement", "span": {"offset": 8, "length": 9}},
                        {"content": "Page", "span": {"offset": 18, "length": 4}},
                        {"content": "1", "span": {"offset": 23, "length": 1}}
                    ],
                    "lines": [
                        {"content": "Service Agreement", "spans": [{"offset": 0, "length": 17}]},
                        {"content": "Page 1", "spans": [{"offset": 18, "length": 6}]}
                    ]
                },
                {
                    "lines": [
                        {"content": "Second page only has line content", "spans": []}
                    ]
                },
                {}
            ],
            "tables": [
                {
                    "rowCount": 2,
                    "columnCount": 2,
                    "cells": [
                        {"rowIndex": 0, "columnIndex": 0, "content": "Metric"},
                        {"rowIndex": 0, "columnIndex": 1, "content": "Target"},
                        {"rowIndex": 1, "columnIndex": 0, "content": "Uptime"},
                        {"rowIndex": 1, "columnIndex": 1, "content": "99.9%"},
                        {"rowIndex": 5, "columnIndex": 0, "content": "out of range"}
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn layout_renders_tables_then_text() {
        let text = render_layout(&sample_result());
        assert_eq!(
            text,
            "---- Table #1 ----\n\
             Metric\tTarget\n\
             Uptime\t99.9%\n\
             ---- Extracted Text ----\n\
             Service Agreement\n\
             Page 1\n\
             \n\
             Second page only has line content"
        );
    }

    #[test]
    fn layout_without_tables_or_pages_is_empty() {
        assert_eq!(render_layout(&AnalyzeResult::default()), "");
    }

    #[test]
    fn create_extractor_by_strategy() {
        let config = Config::default();
        assert_eq!(create_extractor(&config).unwrap().name(), "local");

        let mut layout = Config::from_toml_str("[extraction]\nstrategy = \"layout\"").unwrap();
        assert!(create_extractor(&layout).is_err());

        layout.credentials = Credentials {
            azure_endpoint: Some("https://example.cognitiveservices.azure.com/".to_string()),
            azure_key: Some("key".to_string()),
            ..Default::default()
        };
        let extractor = LayoutExtractor::new(&layout).unwrap();
        assert_eq!(extractor.name(), "layout");
        assert_eq!(
            extractor.analyze_url(),
            "https://example.cognitiveservices.azure.com/documentintelligence/documentModels/prebuilt-layout:analyze?api-version=2024-11-30"
        );
    }

    #[tokio::test]
    async fn load_document_names_by_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contract.pdf");
        std::fs::write(&path, minimal_pdf("service credits")).unwrap();

        let doc = load_document(&LocalPdfExtractor, &path).await.unwrap();
        assert_eq!(doc.name, "contract.pdf");
        assert!(doc.text.contains("service credits"));
    }

    #[tokio::test]
    async fn load_document_missing_file_is_extraction_error() {
        let err = load_document(&LocalPdfExtractor, Path::new("/nonexistent/x.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, DocQaError::Extraction(_)));
    }
}
