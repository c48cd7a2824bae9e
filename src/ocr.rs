use crate::config::OcrSettings;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::session::PageRecord;
use std::path::Path;
use std::process::Command;
use tempfile::NamedTempFile;

/// Text extraction via the tesseract binary
///
/// OCR quality is tesseract's problem; this only shells out and collects
/// stdout.
pub struct OcrEngine {
    settings: OcrSettings,
}

impl OcrEngine {
    pub fn new(settings: OcrSettings) -> Self {
        Self { settings }
    }

    /// Extract text from an image file
    pub fn extract_file(&self, image: &Path) -> Result<String> {
        let output = Command::new(&self.settings.tesseract_path)
            .arg(image)
            .arg("stdout")
            .args(["-l", &self.settings.language])
            .output()
            .map_err(|e| {
                Error::OcrFailed(format!(
                    "failed to run {}: {}",
                    self.settings.tesseract_path, e
                ))
            })?;

        if !output.status.success() {
            return Err(Error::OcrFailed(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Extract text from an in-memory frame
    pub fn extract_frame(&self, frame: &Frame) -> Result<String> {
        let file = NamedTempFile::with_suffix(".png")
            .map_err(|e| Error::OcrFailed(format!("failed to create temp image: {}", e)))?;
        frame.save_png(file.path())?;
        self.extract_file(file.path())
    }

    /// Extract text from every persisted page, in reading order
    ///
    /// Pages that were never persisted or fail OCR are skipped with a
    /// warning; one bad page must not lose the rest of the book.
    pub fn extract_pages(&self, pages: &[PageRecord]) -> String {
        let mut texts: Vec<String> = Vec::new();
        for page in pages {
            let path = match &page.path {
                Some(path) => path,
                None => {
                    log::warn!("page {} has no image on disk; skipping", page.index);
                    continue;
                }
            };
            log::info!("extracting text from page {}/{}", page.index + 1, pages.len());
            match self.extract_file(path) {
                Ok(text) if !text.is_empty() => texts.push(text),
                Ok(_) => {}
                Err(e) => log::warn!("ocr failed for page {}: {}", page.index, e),
            }
        }
        texts.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_without_images_yield_empty_text() {
        let engine = OcrEngine::new(OcrSettings::default());
        let pages = vec![
            PageRecord {
                index: 0,
                path: None,
                captured_at: chrono::Utc::now(),
            },
            PageRecord {
                index: 1,
                path: None,
                captured_at: chrono::Utc::now(),
            },
        ];
        assert_eq!(engine.extract_pages(&pages), "");
    }

    #[test]
    fn missing_binary_is_an_ocr_error() {
        let engine = OcrEngine::new(OcrSettings {
            tesseract_path: "/nonexistent/tesseract".to_string(),
            language: "eng".to_string(),
        });
        let result = engine.extract_file(Path::new("/tmp/nope.png"));
        assert!(matches!(result, Err(Error::OcrFailed(_))));
    }
}
