//! # Excerpt Window Resolution
//!
//! Turns a caller's possibly invalid `(start, length)` request into the
//! window that is actually decoded from a file of known duration.

use crate::config::TARGET_SAMPLE_RATE;

/// Time range decoded from a file, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExcerptWindow {
    /// Offset of the first decoded sample.
    pub start: f32,
    /// Length of the window.
    pub length: f32,
}

impl ExcerptWindow {
    /// Resolve a requested window against the file's total duration.
    ///
    /// The rules are applied in order, each one seeing the length produced
    /// by the previous one:
    ///
    /// 1. `length` is clamped to `total_duration`.
    /// 2. A non-positive `length` selects the whole file.
    /// 3. A negative `start` is a maximum offset toward the center:
    ///    `start = min(-start, (total_duration - length) / 2)`.
    /// 4. A window overrunning the end is shifted left so it ends at
    ///    `total_duration`.
    ///
    /// A request that is already valid is returned unchanged.
    ///
    /// # Example
    ///
    /// ```rust
    /// use core_decoder::ExcerptWindow;
    ///
    /// let window = ExcerptWindow::resolve(100.0, -40.0, 20.0);
    /// assert_eq!(window, ExcerptWindow { start: 40.0, length: 20.0 });
    /// ```
    pub fn resolve(total_duration: f32, start: f32, length: f32) -> Self {
        debug_assert!(total_duration >= 0.0, "negative total duration");

        let mut start = start;
        let mut length = length.min(total_duration);

        if length <= 0.0 {
            start = 0.0;
            length = total_duration;
        } else if start < 0.0 {
            start = (-start).min((total_duration - length) / 2.0);
        } else if start + length > total_duration {
            start = (total_duration - length).max(0.0);
            length = total_duration.min(total_duration - start);
        }

        Self { start, length }
    }

    /// End of the window in seconds.
    pub fn end(&self) -> f32 {
        self.start + self.length
    }

    /// Number of output samples needed to cover the window.
    pub fn sample_count(&self) -> usize {
        if self.length <= 0.0 {
            return 0;
        }
        (f64::from(self.length) * f64::from(TARGET_SAMPLE_RATE)).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn test_non_positive_length_selects_whole_file() {
        for total in [0.0f32, 1.0, 30.0, 245.5] {
            for length in [0.0f32, -1.0, -100.0] {
                for start in [-10.0f32, 0.0, 12.0] {
                    let window = ExcerptWindow::resolve(total, start, length);
                    assert_eq!(window, ExcerptWindow { start: 0.0, length: total });
                }
            }
        }
    }

    #[test]
    fn test_negative_start_is_center_biased() {
        let window = ExcerptWindow::resolve(100.0, -40.0, 20.0);
        assert_eq!(window, ExcerptWindow { start: 40.0, length: 20.0 });

        // Asking for more than the center allows stops at the center.
        let window = ExcerptWindow::resolve(100.0, -90.0, 20.0);
        assert_eq!(window, ExcerptWindow { start: 40.0, length: 20.0 });

        // Small offsets are honored as-is.
        let window = ExcerptWindow::resolve(100.0, -5.0, 20.0);
        assert_eq!(window, ExcerptWindow { start: 5.0, length: 20.0 });
    }

    #[test]
    fn test_overrun_shifts_window_left() {
        let window = ExcerptWindow::resolve(30.0, 25.0, 10.0);
        assert_eq!(window, ExcerptWindow { start: 20.0, length: 10.0 });
    }

    #[test]
    fn test_length_longer_than_file() {
        let window = ExcerptWindow::resolve(30.0, 10.0, 60.0);
        assert_eq!(window, ExcerptWindow { start: 0.0, length: 30.0 });

        let window = ExcerptWindow::resolve(30.0, -10.0, 60.0);
        assert_eq!(window, ExcerptWindow { start: 0.0, length: 30.0 });
    }

    #[test]
    fn test_zero_duration() {
        let window = ExcerptWindow::resolve(0.0, 5.0, 5.0);
        assert_eq!(window, ExcerptWindow { start: 0.0, length: 0.0 });
        assert_eq!(window.sample_count(), 0);
    }

    #[test]
    fn test_valid_request_untouched() {
        let window = ExcerptWindow::resolve(180.0, 30.0, 30.0);
        assert_eq!(window, ExcerptWindow { start: 30.0, length: 30.0 });
    }

    #[test]
    fn test_bounds_hold_on_a_grid() {
        let totals = [0.0f32, 0.5, 1.0, 29.97, 30.0, 100.0, 3600.0];
        let starts = [-500.0f32, -40.0, -0.1, 0.0, 0.1, 15.0, 25.0, 99.0, 4000.0];
        let lengths = [-1.0f32, 0.0, 0.01, 5.0, 10.0, 30.0, 120.0, 10000.0];

        for &total in &totals {
            for &start in &starts {
                for &length in &lengths {
                    let window = ExcerptWindow::resolve(total, start, length);
                    assert!(window.start >= 0.0, "{:?} from ({total}, {start}, {length})", window);
                    assert!(window.end() <= total + EPS, "{:?} from ({total}, {start}, {length})", window);
                    if total > 0.0 {
                        assert!(window.length > 0.0);
                    }

                    let again = ExcerptWindow::resolve(total, window.start, window.length);
                    assert!(
                        (again.start - window.start).abs() <= EPS
                            && (again.length - window.length).abs() <= EPS,
                        "not idempotent for ({total}, {start}, {length})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_sample_count_rounds_up() {
        let window = ExcerptWindow { start: 0.0, length: 10.0 };
        assert_eq!(window.sample_count(), 220_500);

        let window = ExcerptWindow { start: 0.0, length: 0.5 };
        assert_eq!(window.sample_count(), 11_025);

        let window = ExcerptWindow { start: 0.0, length: 1.0 / 22050.0 * 1.5 };
        assert_eq!(window.sample_count(), 2);
    }
}
