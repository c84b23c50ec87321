//! A spinner shown while the model is working.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use loupe_core::output::LoadingIndicator;
use parking_lot::Mutex;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// A [`LoadingIndicator`] drawing a `Processing` spinner on the terminal.
pub struct Spinner {
    style: ProgressStyle,
    message: String,
    // Present while spinning.
    bar: Mutex<Option<ProgressBar>>,
}

impl Spinner {
    /// Creates a spinner labelled `Processing`.
    pub fn new() -> Self {
        Self::with_message("Processing")
    }

    /// Creates a spinner with a custom label.
    pub fn with_message<S: Into<String>>(message: S) -> Self {
        let style = ProgressStyle::with_template("{spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars(TICK_CHARS);
        Self {
            style,
            message: message.into(),
            bar: Mutex::new(None),
        }
    }

    /// Whether the spinner is currently shown.
    #[inline]
    pub fn is_spinning(&self) -> bool {
        self.bar.lock().is_some()
    }
}

impl Default for Spinner {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl LoadingIndicator for Spinner {
    fn start(&self) {
        let mut bar = self.bar.lock();
        if bar.is_some() {
            return;
        }
        let progress_bar = ProgressBar::new_spinner();
        progress_bar.set_style(self.style.clone());
        progress_bar.set_message(self.message.clone());
        progress_bar.enable_steady_tick(TICK_INTERVAL);
        *bar = Some(progress_bar);
    }

    fn stop(&self) {
        if let Some(progress_bar) = self.bar.lock().take() {
            progress_bar.finish_and_clear();
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}
