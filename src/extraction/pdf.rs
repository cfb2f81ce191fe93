//! PDF text extraction via MuPDF
//!
//! MuPDF's context is not thread-safe, so every document is opened and
//! consumed inside one blocking task. OCR runs afterwards on the rendered
//! page images.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use mupdf::{Colorspace, Document, Matrix};

use super::ocr::{OcrError, OcrService};
use super::{ExtractedText, ExtractionError, ExtractionMethod, TextExtractor};

/// Render scale for OCR input
const OCR_RENDER_SCALE: f32 = 2.0;

#[derive(Debug, Clone)]
pub struct PdfExtractionSettings {
    /// Native text shorter than this (trimmed) counts as a scanned document
    pub min_native_chars: usize,
    /// Pages rendered for OCR, from the start of the document
    pub max_ocr_pages: usize,
    /// Upload size limit in bytes
    pub max_bytes: usize,
}

impl Default for PdfExtractionSettings {
    fn default() -> Self {
        Self {
            min_native_chars: 100,
            max_ocr_pages: 30,
            max_bytes: 20 * 1024 * 1024,
        }
    }
}

/// What the blocking pass produced
struct NativePass {
    text: String,
    pages: usize,
    /// PNG renders, only filled when the native text is too short
    renders: Vec<Vec<u8>>,
}

pub struct PdfTextExtractor {
    settings: PdfExtractionSettings,
    ocr: Option<Arc<OcrService>>,
}

impl PdfTextExtractor {
    pub fn new(settings: PdfExtractionSettings, ocr: Option<Arc<OcrService>>) -> Self {
        Self { settings, ocr }
    }

    pub fn settings(&self) -> &PdfExtractionSettings {
        &self.settings
    }

    fn ocr_enabled(&self) -> bool {
        self.ocr.as_ref().is_some_and(|s| s.has_providers())
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract_text(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
        if bytes.len() > self.settings.max_bytes {
            return Err(ExtractionError::TooLarge {
                size: bytes.len(),
                max: self.settings.max_bytes,
            });
        }

        let data = bytes.to_vec();
        let min_chars = self.settings.min_native_chars;
        let ocr_pages = if self.ocr_enabled() {
            self.settings.max_ocr_pages
        } else {
            0
        };

        let pass = tokio::task::spawn_blocking(move || native_pass(&data, min_chars, ocr_pages)).await??;

        if pass.renders.is_empty() {
            let text = pass.text.trim().to_string();
            if text.is_empty() {
                return Err(ExtractionError::NoText);
            }
            tracing::debug!(pages = pass.pages, chars = text.len(), "native text extracted");
            return Ok(ExtractedText {
                text,
                pages: pass.pages,
                method: ExtractionMethod::Native,
            });
        }

        let ocr = match &self.ocr {
            Some(ocr) => ocr,
            None => return Err(ExtractionError::NoText),
        };
        tracing::info!(
            pages = pass.pages,
            rendered = pass.renders.len(),
            native_chars = pass.text.trim().len(),
            "text layer too thin, running OCR"
        );

        let text = ocr.recognize_pages(&pass.renders).await?;
        let text = text.trim();
        if text.is_empty() {
            // OCR found nothing; keep whatever the text layer had
            let native = pass.text.trim();
            if native.is_empty() {
                return Err(ExtractionError::NoText);
            }
            return Ok(ExtractedText {
                text: native.to_string(),
                pages: pass.pages,
                method: ExtractionMethod::Native,
            });
        }

        Ok(ExtractedText {
            text: text.to_string(),
            pages: pass.pages,
            method: ExtractionMethod::Ocr,
        })
    }
}

fn open_error(e: mupdf::Error) -> ExtractionError {
    ExtractionError::Open(e.to_string())
}

/// Read the text layer; render pages for OCR when it is too short
fn native_pass(data: &[u8], min_chars: usize, ocr_pages: usize) -> Result<NativePass, ExtractionError> {
    let doc = Document::from_bytes(data, "application/pdf").map_err(open_error)?;
    let page_count = doc.page_count().map_err(open_error)?.max(0) as usize;

    let mut pages = Vec::with_capacity(page_count);
    for index in 0..page_count {
        let page = doc.load_page(index as i32).map_err(open_error)?;
        match page.to_text() {
            Ok(text) => pages.push(text.trim().to_string()),
            Err(e) => tracing::warn!(page = index + 1, "failed to read text layer: {}", e),
        }
    }
    let text = pages
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut renders = Vec::new();
    if text.trim().chars().count() < min_chars && ocr_pages > 0 {
        for index in 0..page_count.min(ocr_pages) {
            renders.push(render_page(&doc, index)?);
        }
    }

    Ok(NativePass {
        text,
        pages: page_count,
        renders,
    })
}

fn render_page(doc: &Document, index: usize) -> Result<Vec<u8>, ExtractionError> {
    let page = doc.load_page(index as i32).map_err(open_error)?;
    let matrix = Matrix::new_scale(OCR_RENDER_SCALE, OCR_RENDER_SCALE);
    let colorspace = Colorspace::device_rgb();
    let pixmap = page
        .to_pixmap(&matrix, &colorspace, false, true)
        .map_err(|e| OcrError::ImageExtractionError(format!("Failed to render page {}: {}", index + 1, e)))?;

    encode_png(&pixmap).map_err(Into::into)
}

/// Pixmap samples to PNG bytes
fn encode_png(pixmap: &mupdf::Pixmap) -> Result<Vec<u8>, OcrError> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for pixel in 0..(width as usize * height as usize) {
        let offset = pixel * n;
        for channel in 0..3 {
            rgb.push(samples.get(offset + channel).copied().unwrap_or(255));
        }
    }

    let img = image::RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| OcrError::ImageExtractionError("Failed to create image buffer".to_string()))?;

    let mut output = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
        .map_err(|e| OcrError::ImageExtractionError(e.to_string()))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One empty page, as a scanned document without a text layer looks
    fn blank_pdf() -> Vec<u8> {
        b"%PDF-1.4
1 0 obj
<< /Type /Catalog /Pages 2 0 R >>
endobj
2 0 obj
<< /Type /Pages /Kids [3 0 R] /Count 1 >>
endobj
3 0 obj
<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << >> >>
endobj
4 0 obj
<< /Length 0 >>
stream
endstream
endobj
xref
0 5
0000000000 65535 f
0000000009 00000 n
0000000058 00000 n
0000000115 00000 n
0000000226 00000 n
trailer
<< /Size 5 /Root 1 0 R >>
startxref
276
%%EOF"
            .to_vec()
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected() {
        let extractor = PdfTextExtractor::new(
            PdfExtractionSettings {
                max_bytes: 10,
                ..PdfExtractionSettings::default()
            },
            None,
        );

        let err = extractor.extract_text(&[0u8; 11]).await.unwrap_err();
        assert!(matches!(err, ExtractionError::TooLarge { size: 11, max: 10 }));
    }

    #[tokio::test]
    async fn test_garbage_is_not_a_pdf() {
        let extractor = PdfTextExtractor::new(PdfExtractionSettings::default(), None);
        let err = extractor.extract_text(b"definitely not a pdf").await.unwrap_err();
        assert!(matches!(err, ExtractionError::Open(_)));
    }

    #[tokio::test]
    async fn test_blank_page_without_ocr_has_no_text() {
        let extractor = PdfTextExtractor::new(PdfExtractionSettings::default(), None);
        let err = extractor.extract_text(&blank_pdf()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NoText));
    }

    #[test]
    fn test_blank_page_is_rendered_for_ocr() {
        let pass = native_pass(&blank_pdf(), 100, 5).unwrap();
        assert_eq!(pass.pages, 1);
        assert!(pass.text.is_empty());
        assert_eq!(pass.renders.len(), 1);
        assert!(pass.renders[0].starts_with(b"\x89PNG"));
    }

    #[test]
    fn test_no_renders_when_ocr_disabled() {
        let pass = native_pass(&blank_pdf(), 100, 0).unwrap();
        assert!(pass.renders.is_empty());
    }
}
