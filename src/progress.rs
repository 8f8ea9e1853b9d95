//! Progress reporting for conversion runs.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the converter works through a document.
//!
//! Percentages follow a fixed layout: 0 % when the run starts, 10 % once the
//! document is loaded, 10–90 % spread linearly over the pages, 100 % when
//! every page is done. [`ProgressTracker`] computes those values and never
//! lets them go backwards, even though pages inside a batch finish out of
//! order.
//!
//! # Example
//!
//! ```rust
//! use pdfpages::{ConversionConfig, ConversionProgressCallback};
//! use std::sync::Arc;
//!
//! struct PrintPercent;
//!
//! impl ConversionProgressCallback for PrintPercent {
//!     fn on_progress(&self, percent: f32, message: &str) {
//!         eprintln!("{percent:>5.1}%  {message}");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(PrintPercent))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Called by the converter as it processes a document.
///
/// Implementations must be `Send + Sync`: pages of a batch complete on
/// blocking-pool threads. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the document is loaded and the page count is known.
    fn on_conversion_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called whenever the overall percentage advances.
    fn on_progress(&self, percent: f32, message: &str) {
        let _ = (percent, message);
    }

    /// Called when a page has been rendered and encoded.
    ///
    /// # Arguments
    /// * `page_num`    — 1-indexed page number
    /// * `total_pages` — pages in the document
    /// * `byte_size`   — size of the encoded PNG
    fn on_page_complete(&self, page_num: usize, total_pages: usize, byte_size: usize) {
        let _ = (page_num, total_pages, byte_size);
    }

    /// Called when a page fails; the run stops after this.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after the last page of a successful run.
    fn on_conversion_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

/// Percentage reached once the document has loaded.
pub const LOADED_PERCENT: f32 = 10.0;
/// Share of the bar spread across pages.
pub const PAGES_SPAN_PERCENT: f32 = 80.0;

/// Monotonic percentage calculator for one run.
///
/// Stores the high-water mark as `f32` bits so it can be shared between the
/// tasks of a batch without a lock.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    high_water: AtomicU32,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Percentage after `completed` of `total` pages are done.
    pub fn pages_percent(completed: usize, total: usize) -> f32 {
        if total == 0 {
            return LOADED_PERCENT + PAGES_SPAN_PERCENT;
        }
        let done = completed.min(total) as f32;
        LOADED_PERCENT + done / total as f32 * PAGES_SPAN_PERCENT
    }

    /// Record a candidate percentage and return the value to report.
    ///
    /// The result is the maximum of everything observed so far, so callers
    /// can feed values from out-of-order completions.
    pub fn advance(&self, percent: f32) -> f32 {
        let candidate = percent.clamp(0.0, 100.0);
        let mut current = self.high_water.load(Ordering::Acquire);
        loop {
            let current_val = f32::from_bits(current);
            if candidate <= current_val {
                return current_val;
            }
            match self.high_water.compare_exchange_weak(
                current,
                candidate.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return candidate,
                Err(observed) => current = observed,
            }
        }
    }

    /// Highest percentage reported so far.
    pub fn current(&self) -> f32 {
        f32::from_bits(self.high_water.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_order_pages_across_threads_settle_at_max() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.advance(LOADED_PERCENT);

        let handles: Vec<_> = [3usize, 1, 4, 2]
            .into_iter()
            .map(|done| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || tracker.advance(ProgressTracker::pages_percent(done, 4)))
            })
            .collect();
        let reported: Vec<f32> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(reported.iter().all(|&p| p >= LOADED_PERCENT));
        assert_eq!(tracker.current(), 90.0);
    }

    #[test]
    fn page_percentages_span_ten_to_ninety() {
        assert_eq!(ProgressTracker::pages_percent(0, 4), 10.0);
        assert_eq!(ProgressTracker::pages_percent(2, 4), 50.0);
        assert_eq!(ProgressTracker::pages_percent(4, 4), 90.0);
        assert_eq!(ProgressTracker::pages_percent(9, 4), 90.0);
    }

    #[test]
    fn tracker_never_goes_backwards() {
        let t = ProgressTracker::new();
        assert_eq!(t.advance(0.0), 0.0);
        assert_eq!(t.advance(50.0), 50.0);
        assert_eq!(t.advance(30.0), 50.0);
        assert_eq!(t.advance(120.0), 100.0);
        assert_eq!(t.current(), 100.0);
    }
}
