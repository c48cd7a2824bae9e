use crate::config::CompareSettings;
use crate::error::{Error, Result};
use crate::frame::Frame;
use image::imageops::{self, FilterType};
use image::GrayImage;

/// Outcome of comparing two frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageVerdict {
    SamePage,
    DifferentPage,
}

/// Decides whether two frames show the same displayed page
///
/// Both frames are downsampled to a small square, converted to luminance,
/// and compared only over a centered sub-region so that header/footer chrome
/// (clocks, battery icons, progress bars) cannot mask a page turn. A pure
/// function of the two frames and the configured thresholds.
pub struct PageComparer {
    settings: CompareSettings,
}

impl PageComparer {
    pub fn new(settings: CompareSettings) -> Self {
        Self { settings }
    }

    /// Fraction of the compared sub-region whose luminance stayed within
    /// the per-pixel threshold (1.0 = visually identical)
    ///
    /// Errors if the two frames have different dimensions: the capture
    /// source guarantees a stable resolution within a session, so a
    /// mismatch means the reader window was resized mid-run and every
    /// further comparison would be meaningless.
    pub fn similarity(&self, before: &Frame, after: &Frame) -> Result<f64> {
        let (bw, bh) = before.dimensions();
        let (aw, ah) = after.dimensions();
        if (bw, bh) != (aw, ah) {
            return Err(Error::DimensionMismatch {
                before_width: bw,
                before_height: bh,
                after_width: aw,
                after_height: ah,
            });
        }

        let size = self.settings.downsample_size.max(1);
        let center = self.settings.center_size.min(size).max(1);

        let before_gray = downsample_luma(before, size);
        let after_gray = downsample_luma(after, size);

        let start = (size - center) / 2;
        let delta = self.settings.pixel_delta as i16;

        let mut changed = 0u32;
        for y in start..start + center {
            for x in start..start + center {
                let a = before_gray.get_pixel(x, y)[0] as i16;
                let b = after_gray.get_pixel(x, y)[0] as i16;
                if (a - b).abs() > delta {
                    changed += 1;
                }
            }
        }

        let total = (center * center) as f64;
        Ok(1.0 - changed as f64 / total)
    }

    /// Classify two frames as the same or a different displayed page
    pub fn classify(&self, before: &Frame, after: &Frame) -> Result<PageVerdict> {
        let similarity = self.similarity(before, after)?;
        log::debug!(
            "page similarity: {:.3} (threshold: {:.2})",
            similarity,
            self.settings.same_page_threshold
        );
        if similarity > self.settings.same_page_threshold {
            Ok(PageVerdict::SamePage)
        } else {
            Ok(PageVerdict::DifferentPage)
        }
    }
}

fn downsample_luma(frame: &Frame, size: u32) -> GrayImage {
    let small = imageops::resize(frame.image(), size, size, FilterType::Triangle);
    imageops::grayscale(&small)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn solid_frame(side: u32, shade: u8) -> Frame {
        Frame::new(RgbaImage::from_pixel(
            side,
            side,
            Rgba([shade, shade, shade, 255]),
        ))
    }

    /// Frame whose centered square (fraction of the full side) differs in shade
    fn frame_with_center(side: u32, outer: u8, inner: u8, inner_frac: f64) -> Frame {
        let inner_side = (side as f64 * inner_frac) as u32;
        let start = (side - inner_side) / 2;
        let img = RgbaImage::from_fn(side, side, |x, y| {
            let in_center = x >= start
                && x < start + inner_side
                && y >= start
                && y < start + inner_side;
            let shade = if in_center { inner } else { outer };
            Rgba([shade, shade, shade, 255])
        });
        Frame::new(img)
    }

    fn comparer() -> PageComparer {
        PageComparer::new(CompareSettings::default())
    }

    #[test]
    fn identical_frames_are_same_page() {
        let a = solid_frame(400, 120);
        let b = solid_frame(400, 120);
        let c = comparer();
        assert_eq!(c.similarity(&a, &b).unwrap(), 1.0);
        assert_eq!(c.classify(&a, &b).unwrap(), PageVerdict::SamePage);
    }

    #[test]
    fn noise_below_pixel_delta_is_same_page() {
        // Anti-aliasing level jitter: well under the per-pixel threshold
        let a = solid_frame(400, 120);
        let b = solid_frame(400, 128);
        let c = comparer();
        assert_eq!(c.similarity(&a, &b).unwrap(), 1.0);
    }

    #[test]
    fn changes_outside_center_are_same_page() {
        // Both frames share the center; only the outer band (header/footer
        // chrome) changes shade.
        let a = frame_with_center(400, 30, 120, 0.6);
        let b = frame_with_center(400, 230, 120, 0.6);
        let c = comparer();
        assert_eq!(c.classify(&a, &b).unwrap(), PageVerdict::SamePage);
    }

    #[test]
    fn full_content_change_is_different_page() {
        let a = solid_frame(400, 30);
        let b = solid_frame(400, 230);
        let c = comparer();
        assert_eq!(c.similarity(&a, &b).unwrap(), 0.0);
        assert_eq!(c.classify(&a, &b).unwrap(), PageVerdict::DifferentPage);
    }

    #[test]
    fn change_across_sixteen_percent_of_center_is_different_page() {
        // The inner 20% of the frame maps to 16% of the compared
        // sub-region, past the 10% the similarity threshold allows
        let a = frame_with_center(400, 120, 30, 0.2);
        let b = frame_with_center(400, 120, 230, 0.2);
        let c = comparer();
        assert_eq!(c.classify(&a, &b).unwrap(), PageVerdict::DifferentPage);
    }

    #[test]
    fn change_across_four_percent_of_center_is_same_page() {
        let a = frame_with_center(400, 120, 30, 0.1);
        let b = frame_with_center(400, 120, 230, 0.1);
        let c = comparer();
        assert_eq!(c.classify(&a, &b).unwrap(), PageVerdict::SamePage);
    }

    #[test]
    fn classification_is_idempotent() {
        let a = frame_with_center(400, 30, 120, 0.4);
        let b = frame_with_center(400, 30, 200, 0.4);
        let c = comparer();
        let first = c.classify(&a, &b).unwrap();
        for _ in 0..5 {
            assert_eq!(c.classify(&a, &b).unwrap(), first);
        }
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let a = solid_frame(400, 120);
        let b = solid_frame(410, 120);
        let c = comparer();
        assert!(matches!(
            c.similarity(&a, &b),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn raising_pixel_delta_never_lowers_similarity() {
        // Sensitivity must be monotonic in the per-pixel threshold
        let a = frame_with_center(400, 60, 100, 0.5);
        let b = frame_with_center(400, 80, 150, 0.5);
        let mut previous = 0.0;
        for delta in [0u8, 10, 30, 60, 120, 255] {
            let c = PageComparer::new(CompareSettings {
                pixel_delta: delta,
                ..CompareSettings::default()
            });
            let similarity = c.similarity(&a, &b).unwrap();
            assert!(
                similarity >= previous,
                "similarity {} dropped below {} at delta {}",
                similarity,
                previous,
                delta
            );
            previous = similarity;
        }
    }
}
