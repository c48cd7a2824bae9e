use crate::capture::ScreenSource;
use crate::compare::{PageComparer, PageVerdict};
use crate::error::Result;
use crate::input::{Injector, PageKey};
use crate::session::AdvanceDirection;
use std::thread;
use std::time::Duration;

/// Determine, once per session, which key actually turns the page
///
/// Presses forward, then backward, watching for a visible page change, and
/// restores the original page before returning. On a no-op probe or any
/// capture/injection error the permissive default is `Forward`: a book that
/// cannot be advanced fails fast in the main loop instead of silently
/// looping with the wrong key. This function never raises.
pub fn probe_direction(
    source: &mut dyn ScreenSource,
    injector: &mut dyn Injector,
    comparer: &PageComparer,
    settle: Duration,
) -> AdvanceDirection {
    match try_probe(source, injector, comparer, settle) {
        Ok(direction) => direction,
        Err(e) => {
            log::warn!("direction probe failed: {}; defaulting to forward", e);
            AdvanceDirection::Forward
        }
    }
}

fn try_probe(
    source: &mut dyn ScreenSource,
    injector: &mut dyn Injector,
    comparer: &PageComparer,
    settle: Duration,
) -> Result<AdvanceDirection> {
    let baseline = source.capture()?;

    injector.press(PageKey::Forward)?;
    thread::sleep(settle);
    let after_forward = source.capture()?;

    if comparer.classify(&baseline, &after_forward)? == PageVerdict::DifferentPage {
        // Undo the probe before handing control back
        injector.press(PageKey::Backward)?;
        thread::sleep(settle);
        log::info!("forward key turns the page");
        return Ok(AdvanceDirection::Forward);
    }

    injector.press(PageKey::Backward)?;
    thread::sleep(settle);
    let after_backward = source.capture()?;

    if comparer.classify(&baseline, &after_backward)? == PageVerdict::DifferentPage {
        injector.press(PageKey::Forward)?;
        thread::sleep(settle);
        log::info!("backward key turns the page");
        return Ok(AdvanceDirection::Backward);
    }

    log::warn!("neither key changed the page; defaulting to forward");
    Ok(AdvanceDirection::Forward)
}
