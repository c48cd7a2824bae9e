use crate::capture::KWinScreenSource;
use crate::compare::PageComparer;
use crate::config::Config;
use crate::error::Result;
use crate::input::UinputInjector;
use crate::ocr::OcrEngine;
use crate::probe::probe_direction;
use crate::reader;
use crate::session::{CaptureLoop, CaptureReport, StopReason};
use crate::storage::{BookPaths, DirSink, DriveClient};
use crate::summarize::Summarizer;
use std::fs;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// One full book run: focus the reader, capture every page, then hand the
/// results to the downstream services
///
/// Capture is the only phase that can fail the run. Upload, OCR and
/// summarization are best-effort: their failures are logged and whatever
/// was collected stays on disk.
pub struct BookRun {
    config: Config,
    title: String,
    page_budget: Option<usize>,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl BookRun {
    pub fn new(config: Config, title: &str) -> Self {
        Self {
            config,
            title: title.to_string(),
            page_budget: None,
            stop_flag: None,
        }
    }

    /// Limit the run to the first N pages
    pub fn with_page_budget(mut self, budget: Option<usize>) -> Self {
        self.page_budget = budget;
        self
    }

    /// Flag checked between pages for cooperative early exit
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    pub fn execute(&self) -> Result<CaptureReport> {
        let paths = BookPaths::new(&self.config.output, &self.title);
        paths.create_dirs()?;
        log::info!("output folder: {}", paths.root.display());

        let mut source = KWinScreenSource::new();
        let mut injector = UinputInjector::new()?;
        let settle = Duration::from_secs_f64(self.config.capture.page_turn_delay_secs);

        // The book must already be open on its first page; all we do here
        // is bring the reader to the front
        if let Err(e) = reader::activate_window(&self.config.reader.window_title) {
            log::warn!("could not focus the reader window: {}", e);
        }
        thread::sleep(Duration::from_secs_f64(self.config.reader.focus_delay_secs));

        let ocr = OcrEngine::new(self.config.ocr.clone());
        let known_total = reader::detect_total_pages(&mut source, &mut injector, &ocr, settle);

        // A detected total caps the budget the same way a user-entered
        // page count would
        let budget = match (self.page_budget, known_total) {
            (Some(budget), Some(total)) => Some(budget.min(total)),
            (Some(budget), None) => Some(budget),
            (None, total) => total,
        };

        let comparer = PageComparer::new(self.config.compare.clone());
        let direction = probe_direction(&mut source, &mut injector, &comparer, settle);
        log::info!("page-turn direction: {}", direction);

        let mut sink = DirSink::new(paths.screenshots_dir.clone());
        let mut capture_loop = CaptureLoop::new(
            &mut source,
            &mut injector,
            comparer,
            self.config.capture.clone(),
            direction,
        )
        .with_page_budget(budget)
        .with_known_total(known_total)
        .with_sink(&mut sink);
        if let Some(flag) = &self.stop_flag {
            capture_loop = capture_loop.with_stop_flag(Arc::clone(flag));
        }

        let report = capture_loop.run();

        if let StopReason::CaptureFailed(_) = &report.reason {
            log::error!("capture aborted: {}", report.reason);
        }
        if report.pages.is_empty() {
            log::error!("no pages were captured");
            return Ok(report);
        }

        self.upload_and_extract(&paths, &report);

        Ok(report)
    }

    /// Downstream half of the pipeline: Drive upload, OCR, summarization
    fn upload_and_extract(&self, paths: &BookPaths, report: &CaptureReport) {
        let drive = DriveClient::from_settings(&self.config.drive);
        let mut book_folder: Option<String> = None;

        if let Some(drive) = &drive {
            match drive.create_folder(&self.title) {
                Ok(id) => book_folder = Some(id),
                Err(e) => {
                    log::warn!("Drive folder creation failed: {}; using the default folder", e)
                }
            }
            drive.upload_pages(&report.pages, book_folder.as_deref());
        } else {
            log::info!("Drive upload not configured; keeping local copies only");
        }

        log::info!("extracting text from {} pages...", report.pages.len());
        let text = OcrEngine::new(self.config.ocr.clone()).extract_pages(&report.pages);
        if let Err(e) = fs::write(&paths.text_path, &text) {
            log::error!("could not write {}: {}", paths.text_path.display(), e);
            return;
        }
        log::info!("extracted text saved to {}", paths.text_path.display());

        if let Some(drive) = &drive {
            let name = paths
                .text_path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "extracted_text.txt".to_string());
            if let Err(e) = drive.upload_file(&paths.text_path, &name, book_folder.as_deref()) {
                log::warn!("text upload failed: {}", e);
            }
        }

        match Summarizer::from_settings(&self.config.llm) {
            Some(summarizer) if !text.is_empty() => {
                log::info!("summarizing extracted text...");
                match summarizer.summarize(&text) {
                    Ok(summary) => {
                        if let Err(e) = fs::write(&paths.summary_path, &summary) {
                            log::error!(
                                "could not write {}: {}",
                                paths.summary_path.display(),
                                e
                            );
                        } else {
                            log::info!("summary saved to {}", paths.summary_path.display());
                        }
                    }
                    Err(e) => log::warn!("summarization failed: {}", e),
                }
            }
            Some(_) => log::warn!("no text was extracted; skipping summarization"),
            None => log::info!("no LLM API key configured; skipping summarization"),
        }
    }
}
