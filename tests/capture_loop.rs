//! Loop-level tests for the capture controller and direction prober,
//! driven through the crate's trait seams with a simulated reader.
//!
//! All delays are zeroed so the tests run at full speed.

use image::{Rgba, RgbaImage};
use readerctl::config::{CaptureSettings, CompareSettings};
use readerctl::{
    AdvanceDirection, CaptureLoop, Error, Frame, Injector, PageComparer, PageKey, PageSink,
    Result, ScreenSource, StopReason,
};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Render a page as a solid shade; consecutive pages always differ by more
/// than the default per-pixel threshold
fn page_frame(page: i64) -> Frame {
    let shade = ((page * 37).rem_euclid(200) + 20) as u8;
    Frame::new(RgbaImage::from_pixel(
        320,
        320,
        Rgba([shade, shade, shade, 255]),
    ))
}

/// A reader application with a current position, a last page, and a
/// configurable effect for each arrow key
struct SimReader {
    position: i64,
    last_page: i64,
    forward_delta: i64,
    backward_delta: i64,
    presses: u32,
}

impl SimReader {
    /// Ordinary left-to-right book with a fixed number of pages
    fn book(pages: i64) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            position: 0,
            last_page: pages - 1,
            forward_delta: 1,
            backward_delta: -1,
            presses: 0,
        }))
    }

    /// Book that never runs out of pages
    fn endless() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            position: 0,
            last_page: i64::MAX,
            forward_delta: 1,
            backward_delta: -1,
            presses: 0,
        }))
    }

    /// Right-to-left book: the "backward" key advances, the "forward" key
    /// pages back (a no-op on the first page)
    fn right_to_left() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            position: 0,
            last_page: i64::MAX,
            forward_delta: -1,
            backward_delta: 1,
            presses: 0,
        }))
    }

    /// Reader that ignores both keys
    fn dead() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            position: 0,
            last_page: 0,
            forward_delta: 0,
            backward_delta: 0,
            presses: 0,
        }))
    }
}

struct SimSource(Rc<RefCell<SimReader>>);

impl ScreenSource for SimSource {
    fn capture(&mut self) -> Result<Frame> {
        Ok(page_frame(self.0.borrow().position))
    }
}

struct SimInjector(Rc<RefCell<SimReader>>);

impl Injector for SimInjector {
    fn press(&mut self, key: PageKey) -> Result<()> {
        let mut reader = self.0.borrow_mut();
        let delta = match key {
            PageKey::Forward => reader.forward_delta,
            PageKey::Backward => reader.backward_delta,
        };
        reader.position = (reader.position + delta).clamp(0, reader.last_page);
        reader.presses += 1;
        Ok(())
    }

    fn move_and_click(&mut self, _x: i32, _y: i32) -> Result<()> {
        Ok(())
    }
}

struct NoopInjector;

impl Injector for NoopInjector {
    fn press(&mut self, _key: PageKey) -> Result<()> {
        Ok(())
    }

    fn move_and_click(&mut self, _x: i32, _y: i32) -> Result<()> {
        Ok(())
    }
}

/// Source that yields a distinct frame per call, erroring after a limit
struct CountingSource {
    calls: i64,
    fail_after: Option<i64>,
}

impl CountingSource {
    fn new(fail_after: Option<i64>) -> Self {
        Self {
            calls: 0,
            fail_after,
        }
    }
}

impl ScreenSource for CountingSource {
    fn capture(&mut self) -> Result<Frame> {
        if let Some(limit) = self.fail_after {
            if self.calls >= limit {
                return Err(Error::CaptureFailed("channel closed".to_string()));
            }
        }
        let frame = page_frame(self.calls);
        self.calls += 1;
        Ok(frame)
    }
}

/// Source whose frames grow mid-session, as if the window were resized
struct ResizingSource {
    calls: i64,
    resize_at: i64,
}

impl ScreenSource for ResizingSource {
    fn capture(&mut self) -> Result<Frame> {
        let side = if self.calls < self.resize_at { 320 } else { 336 };
        let shade = ((self.calls * 37).rem_euclid(200) + 20) as u8;
        self.calls += 1;
        Ok(Frame::new(RgbaImage::from_pixel(
            side,
            side,
            Rgba([shade, shade, shade, 255]),
        )))
    }
}

/// Sink that records stored indices and can fail on demand
struct RecordingSink {
    stored: Vec<usize>,
    fail_on: Option<usize>,
    raise_on: Option<(usize, Arc<AtomicBool>)>,
}

impl RecordingSink {
    fn new() -> Self {
        Self {
            stored: Vec::new(),
            fail_on: None,
            raise_on: None,
        }
    }
}

impl PageSink for RecordingSink {
    fn store(&mut self, index: usize, _frame: &Frame) -> Result<PathBuf> {
        if let Some((at, flag)) = &self.raise_on {
            if index == *at {
                flag.store(true, Ordering::Relaxed);
            }
        }
        if self.fail_on == Some(index) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.stored.push(index);
        Ok(PathBuf::from(format!("/tmp/page_{:04}.png", index)))
    }
}

fn fast_settings() -> CaptureSettings {
    CaptureSettings {
        page_turn_delay_secs: 0.0,
        screenshot_delay_secs: 0.0,
        retry_delay_secs: 0.0,
        ..CaptureSettings::default()
    }
}

fn comparer() -> PageComparer {
    PageComparer::new(CompareSettings::default())
}

#[test]
fn finite_book_yields_exact_page_count() {
    let reader = SimReader::book(15);
    let mut source = SimSource(Rc::clone(&reader));
    let mut injector = SimInjector(Rc::clone(&reader));

    let report = CaptureLoop::new(
        &mut source,
        &mut injector,
        comparer(),
        fast_settings(),
        AdvanceDirection::Forward,
    )
    .run();

    assert_eq!(report.pages.len(), 15);
    assert_eq!(report.reason, StopReason::AdvanceExhausted);

    // One press per successful page turn, plus exactly retry_limit failed
    // attempts on the last page
    assert_eq!(reader.borrow().presses, 14 + 3);

    // No gaps, no duplicates, reading order
    for (i, page) in report.pages.iter().enumerate() {
        assert_eq!(page.index, i);
    }
}

#[test]
fn page_budget_caps_the_run() {
    let reader = SimReader::endless();
    let mut source = SimSource(Rc::clone(&reader));
    let mut injector = SimInjector(Rc::clone(&reader));

    let report = CaptureLoop::new(
        &mut source,
        &mut injector,
        comparer(),
        fast_settings(),
        AdvanceDirection::Forward,
    )
    .with_page_budget(Some(5))
    .run();

    assert_eq!(report.pages.len(), 5);
    assert_eq!(report.reason, StopReason::PageBudgetReached);
}

#[test]
fn known_total_stops_the_run() {
    let reader = SimReader::endless();
    let mut source = SimSource(Rc::clone(&reader));
    let mut injector = SimInjector(Rc::clone(&reader));

    let report = CaptureLoop::new(
        &mut source,
        &mut injector,
        comparer(),
        fast_settings(),
        AdvanceDirection::Forward,
    )
    .with_known_total(Some(20))
    .run();

    assert_eq!(report.pages.len(), 20);
    assert_eq!(report.reason, StopReason::KnownTotalReached);
}

#[test]
fn early_pages_are_exempt_from_known_total() {
    // A noisy "total" below the exemption window must not end the run
    // until the window has passed
    let reader = SimReader::endless();
    let mut source = SimSource(Rc::clone(&reader));
    let mut injector = SimInjector(Rc::clone(&reader));

    let report = CaptureLoop::new(
        &mut source,
        &mut injector,
        comparer(),
        fast_settings(),
        AdvanceDirection::Forward,
    )
    .with_known_total(Some(5))
    .run();

    assert_eq!(report.pages.len(), 11);
    assert_eq!(report.reason, StopReason::KnownTotalReached);
}

#[test]
fn safety_ceiling_guards_runaway_runs() {
    let reader = SimReader::endless();
    let mut source = SimSource(Rc::clone(&reader));
    let mut injector = SimInjector(Rc::clone(&reader));

    let report = CaptureLoop::new(
        &mut source,
        &mut injector,
        comparer(),
        fast_settings(),
        AdvanceDirection::Forward,
    )
    .run();

    assert_eq!(report.pages.len(), 500);
    assert_eq!(report.reason, StopReason::SafetyCeilingReached);
}

#[test]
fn right_to_left_book_advances_backward() {
    let reader = SimReader::right_to_left();
    let mut source = SimSource(Rc::clone(&reader));
    let mut injector = SimInjector(Rc::clone(&reader));

    let report = CaptureLoop::new(
        &mut source,
        &mut injector,
        comparer(),
        fast_settings(),
        AdvanceDirection::Backward,
    )
    .with_page_budget(Some(4))
    .run();

    assert_eq!(report.pages.len(), 4);
    assert_eq!(report.reason, StopReason::PageBudgetReached);
    // The loop turns the page once more before noticing the budget
    assert_eq!(reader.borrow().position, 4);
}

#[test]
fn capture_failure_returns_partial_result() {
    let mut source = CountingSource::new(Some(7));
    let mut injector = NoopInjector;

    let report = CaptureLoop::new(
        &mut source,
        &mut injector,
        comparer(),
        fast_settings(),
        AdvanceDirection::Forward,
    )
    .run();

    assert_eq!(report.pages.len(), 7);
    assert!(matches!(report.reason, StopReason::CaptureFailed(_)));
}

#[test]
fn mid_session_resize_fails_the_run() {
    let mut source = ResizingSource {
        calls: 0,
        resize_at: 3,
    };
    let mut injector = NoopInjector;

    let report = CaptureLoop::new(
        &mut source,
        &mut injector,
        comparer(),
        fast_settings(),
        AdvanceDirection::Forward,
    )
    .run();

    assert_eq!(report.pages.len(), 3);
    assert!(matches!(report.reason, StopReason::CaptureFailed(_)));
}

#[test]
fn sink_failure_does_not_stop_capture() {
    let reader = SimReader::endless();
    let mut source = SimSource(Rc::clone(&reader));
    let mut injector = SimInjector(Rc::clone(&reader));
    let mut sink = RecordingSink::new();
    sink.fail_on = Some(1);

    let report = CaptureLoop::new(
        &mut source,
        &mut injector,
        comparer(),
        fast_settings(),
        AdvanceDirection::Forward,
    )
    .with_page_budget(Some(3))
    .with_sink(&mut sink)
    .run();

    assert_eq!(report.pages.len(), 3);
    assert_eq!(report.reason, StopReason::PageBudgetReached);
    assert!(report.pages[0].path.is_some());
    assert!(report.pages[1].path.is_none());
    assert!(report.pages[2].path.is_some());
    assert_eq!(sink.stored, vec![0, 2]);
}

#[test]
fn stop_flag_cancels_between_pages() {
    let reader = SimReader::endless();
    let mut source = SimSource(Rc::clone(&reader));
    let mut injector = SimInjector(Rc::clone(&reader));

    let flag = Arc::new(AtomicBool::new(false));
    let mut sink = RecordingSink::new();
    sink.raise_on = Some((2, Arc::clone(&flag)));

    let report = CaptureLoop::new(
        &mut source,
        &mut injector,
        comparer(),
        fast_settings(),
        AdvanceDirection::Forward,
    )
    .with_sink(&mut sink)
    .with_stop_flag(flag)
    .run();

    assert_eq!(report.pages.len(), 3);
    assert_eq!(report.reason, StopReason::Cancelled);
}

#[test]
fn prober_picks_forward_on_ordinary_books() {
    let reader = SimReader::endless();
    let mut source = SimSource(Rc::clone(&reader));
    let mut injector = SimInjector(Rc::clone(&reader));

    let direction = readerctl::probe_direction(
        &mut source,
        &mut injector,
        &comparer(),
        Duration::ZERO,
    );

    assert_eq!(direction, AdvanceDirection::Forward);
    assert_eq!(reader.borrow().position, 0);
}

#[test]
fn prober_picks_backward_on_right_to_left_books() {
    let reader = SimReader::right_to_left();
    let mut source = SimSource(Rc::clone(&reader));
    let mut injector = SimInjector(Rc::clone(&reader));

    let direction = readerctl::probe_direction(
        &mut source,
        &mut injector,
        &comparer(),
        Duration::ZERO,
    );

    assert_eq!(direction, AdvanceDirection::Backward);
    assert_eq!(reader.borrow().position, 0);
}

#[test]
fn prober_defaults_to_forward_when_nothing_changes() {
    let reader = SimReader::dead();
    let mut source = SimSource(Rc::clone(&reader));
    let mut injector = SimInjector(Rc::clone(&reader));

    let direction = readerctl::probe_direction(
        &mut source,
        &mut injector,
        &comparer(),
        Duration::ZERO,
    );

    assert_eq!(direction, AdvanceDirection::Forward);
}

#[test]
fn prober_defaults_to_forward_on_capture_errors() {
    let mut source = CountingSource::new(Some(0));
    let mut injector = NoopInjector;

    let direction = readerctl::probe_direction(
        &mut source,
        &mut injector,
        &comparer(),
        Duration::ZERO,
    );

    assert_eq!(direction, AdvanceDirection::Forward);
}
