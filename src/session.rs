use crate::capture::ScreenSource;
use crate::compare::{PageComparer, PageVerdict};
use crate::config::CaptureSettings;
use crate::error::Result;
use crate::frame::Frame;
use crate::input::{Injector, PageKey};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// The key fixed by the direction probe for the rest of the session
///
/// Once fixed it is never re-probed; failed page turns are handled by
/// retrying, not by switching direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceDirection {
    Forward,
    Backward,
}

impl AdvanceDirection {
    pub fn key(self) -> PageKey {
        match self {
            AdvanceDirection::Forward => PageKey::Forward,
            AdvanceDirection::Backward => PageKey::Backward,
        }
    }
}

impl fmt::Display for AdvanceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvanceDirection::Forward => write!(f, "forward"),
            AdvanceDirection::Backward => write!(f, "backward"),
        }
    }
}

/// Why the capture loop terminated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The retry budget was spent without the page changing; in practice
    /// this is the end of the book
    AdvanceExhausted,
    /// The caller-supplied page budget was reached
    PageBudgetReached,
    /// The advisory total page count was reached
    KnownTotalReached,
    /// The runaway guard fired
    SafetyCeilingReached,
    /// The capture channel failed; it is not retried because a broken
    /// channel will not heal within a session
    CaptureFailed(String),
    /// The caller's stop flag was raised
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::AdvanceExhausted => write!(f, "advance-exhausted"),
            StopReason::PageBudgetReached => write!(f, "page-budget-reached"),
            StopReason::KnownTotalReached => write!(f, "known-total-reached"),
            StopReason::SafetyCeilingReached => write!(f, "safety-ceiling-reached"),
            StopReason::CaptureFailed(msg) => write!(f, "capture-failure: {}", msg),
            StopReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One captured page in reading order
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub index: usize,
    /// Where the page image landed, if the sink accepted it
    pub path: Option<PathBuf>,
    pub captured_at: DateTime<Utc>,
}

/// Destination for captured page images
///
/// Sink failures are logged and do not stop the capture loop; the loop does
/// not depend on persistence succeeding to keep reading.
pub trait PageSink {
    fn store(&mut self, index: usize, frame: &Frame) -> Result<PathBuf>;
}

/// Running state of one full-book capture
///
/// Created when the loop starts and discarded when it terminates; the
/// sequence index always equals the number of appended pages, and a failed
/// page turn never appends.
pub struct CaptureSession {
    pages: Vec<PageRecord>,
    consecutive_failures: u32,
    page_budget: Option<usize>,
    known_total: Option<usize>,
}

impl CaptureSession {
    fn new(page_budget: Option<usize>, known_total: Option<usize>) -> Self {
        Self {
            pages: Vec::new(),
            consecutive_failures: 0,
            page_budget,
            known_total,
        }
    }

    /// Index the next appended page will receive
    pub fn next_index(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[PageRecord] {
        &self.pages
    }
}

/// Result of a capture run: the pages collected so far plus why it stopped
///
/// A partial sequence with a failure reason is still returned in full; a
/// resumable partial result beats total failure.
#[derive(Debug)]
pub struct CaptureReport {
    pub pages: Vec<PageRecord>,
    pub reason: StopReason,
    pub direction: AdvanceDirection,
}

/// Drives the capture → compare → advance cycle
///
/// Single-threaded and synchronous: capture and injection share one
/// foreground window and one input focus, so nothing here may overlap. All
/// waiting is plain sleeps taken from the settings, which tests set to zero.
pub struct CaptureLoop<'a> {
    source: &'a mut dyn ScreenSource,
    injector: &'a mut dyn Injector,
    comparer: PageComparer,
    settings: CaptureSettings,
    direction: AdvanceDirection,
    sink: Option<&'a mut dyn PageSink>,
    page_budget: Option<usize>,
    known_total: Option<usize>,
    stop_flag: Option<Arc<AtomicBool>>,
}

impl<'a> CaptureLoop<'a> {
    pub fn new(
        source: &'a mut dyn ScreenSource,
        injector: &'a mut dyn Injector,
        comparer: PageComparer,
        settings: CaptureSettings,
        direction: AdvanceDirection,
    ) -> Self {
        Self {
            source,
            injector,
            comparer,
            settings,
            direction,
            sink: None,
            page_budget: None,
            known_total: None,
            stop_flag: None,
        }
    }

    /// Hard cap on captured pages supplied by the caller
    pub fn with_page_budget(mut self, budget: Option<usize>) -> Self {
        self.page_budget = budget;
        self
    }

    /// Advisory total page count; not authoritative
    pub fn with_known_total(mut self, total: Option<usize>) -> Self {
        self.known_total = total;
        self
    }

    /// Persist each captured page through the sink
    pub fn with_sink(mut self, sink: &'a mut dyn PageSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Flag polled at the top of each iteration for cooperative early exit
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    /// Run the loop to termination
    ///
    /// Always returns a report; capture-channel failures surface as
    /// `StopReason::CaptureFailed` with whatever pages were collected.
    pub fn run(mut self) -> CaptureReport {
        let mut session = CaptureSession::new(self.page_budget, self.known_total);

        let mut current = match self.source.capture() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("initial capture failed: {}", e);
                return self.finish(session, StopReason::CaptureFailed(e.to_string()));
            }
        };

        loop {
            if let Some(reason) = self.should_stop(&session) {
                return self.finish(session, reason);
            }

            self.append_page(&mut session, &current);
            self.report_progress(&session);

            match self.advance(&mut session, &current) {
                Ok(Some(next)) => {
                    session.consecutive_failures = 0;
                    current = next;
                }
                Ok(None) => {
                    log::info!(
                        "page did not change after {} attempts; assuming end of book",
                        self.settings.retry_limit
                    );
                    return self.finish(session, StopReason::AdvanceExhausted);
                }
                Err(reason) => return self.finish(session, reason),
            }

            sleep_secs(self.settings.screenshot_delay_secs);
        }
    }

    /// Termination checks, evaluated before each page is appended
    ///
    /// Early pages are exempt from the total/ceiling checks because page
    /// detection is noisy at the start of a book; the caller's budget and
    /// stop flag always apply.
    fn should_stop(&self, session: &CaptureSession) -> Option<StopReason> {
        if let Some(flag) = &self.stop_flag {
            if flag.load(Ordering::Relaxed) {
                return Some(StopReason::Cancelled);
            }
        }

        let count = session.pages.len();

        if let Some(budget) = session.page_budget {
            if count >= budget {
                return Some(StopReason::PageBudgetReached);
            }
        }

        if count > self.settings.early_page_exemption {
            if let Some(total) = session.known_total {
                if count >= total {
                    return Some(StopReason::KnownTotalReached);
                }
            }
            if count >= self.settings.safety_ceiling {
                return Some(StopReason::SafetyCeilingReached);
            }
        }

        None
    }

    fn append_page(&mut self, session: &mut CaptureSession, frame: &Frame) {
        let index = session.next_index();
        let path = match &mut self.sink {
            Some(sink) => match sink.store(index, frame) {
                Ok(path) => Some(path),
                Err(e) => {
                    log::warn!("page {} was captured but not persisted: {}", index, e);
                    None
                }
            },
            None => None,
        };
        session.pages.push(PageRecord {
            index,
            path,
            captured_at: frame.captured_at(),
        });
    }

    /// Turn the page and capture the result, retrying up to the limit
    ///
    /// Returns the frame of the new page, `None` when the retry budget is
    /// spent without progress, or a terminal reason on capture failure. The
    /// frame returned here is the one the next iteration appends, so every
    /// appended page corresponds to exactly one classified-as-new capture.
    fn advance(
        &mut self,
        session: &mut CaptureSession,
        current: &Frame,
    ) -> std::result::Result<Option<Frame>, StopReason> {
        loop {
            if let Err(e) = self.injector.press(self.direction.key()) {
                // A single failed injection is indistinguishable from a
                // stuck page; let the retry discipline absorb it
                log::warn!("page-turn key injection failed: {}", e);
            }
            sleep_secs(self.settings.page_turn_delay_secs);

            let candidate = match self.source.capture() {
                Ok(frame) => frame,
                Err(e) => {
                    log::error!("capture failed while turning page: {}", e);
                    return Err(StopReason::CaptureFailed(e.to_string()));
                }
            };

            match self.comparer.classify(current, &candidate) {
                Ok(PageVerdict::DifferentPage) => {
                    return Ok(Some(candidate));
                }
                Ok(PageVerdict::SamePage) => {
                    session.consecutive_failures += 1;
                    if session.consecutive_failures >= self.settings.retry_limit {
                        return Ok(None);
                    }
                    log::warn!(
                        "page did not change (attempt {}/{})",
                        session.consecutive_failures,
                        self.settings.retry_limit
                    );
                    sleep_secs(self.settings.retry_delay_secs);
                }
                Err(e) => {
                    // Dimension mismatch: the provider broke its
                    // stable-resolution contract
                    log::error!("page comparison failed: {}", e);
                    return Err(StopReason::CaptureFailed(e.to_string()));
                }
            }
        }
    }

    fn report_progress(&self, session: &CaptureSession) {
        let count = session.pages.len();
        if let Some(total) = session.known_total {
            let percentage = count as f64 / total as f64 * 100.0;
            log::info!("progress: {}/{} pages ({:.1}%)", count, total, percentage);
        } else if count % 10 == 0 {
            log::info!("progress: {} pages captured", count);
        }
    }

    fn finish(self, session: CaptureSession, reason: StopReason) -> CaptureReport {
        log::info!(
            "capture loop finished: {} pages, {}",
            session.pages.len(),
            reason
        );
        CaptureReport {
            pages: session.pages,
            reason,
            direction: self.direction,
        }
    }
}

fn sleep_secs(secs: f64) {
    if secs > 0.0 {
        thread::sleep(Duration::from_secs_f64(secs));
    }
}
