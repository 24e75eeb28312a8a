//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner shown while a long backend phase runs
#[derive(Debug)]
pub struct ProgressReporter {
    spinner: Option<ProgressBar>,
}

impl ProgressReporter {
    /// Start a spinner with the given message
    pub fn new(message: &str) -> Self {
        Self {
            spinner: create_spinner(message),
        }
    }

    /// Create minimal progress reporter (no spinner)
    pub fn new_minimal() -> Self {
        Self { spinner: None }
    }

    /// Change the message of the running spinner
    pub fn update(&self, message: &str) {
        if let Some(pb) = &self.spinner {
            pb.set_message(message.to_string());
        }
    }

    /// Stop the spinner and leave `message` behind
    pub fn finish(&mut self, message: &str) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    pub fn is_active(&self) -> bool {
        self.spinner.is_some()
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        // An unfinished spinner means the phase failed; clear it silently
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

fn create_spinner(message: &str) -> Option<ProgressBar> {
    let style = match ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
    {
        Ok(style) => style,
        Err(e) => {
            log::debug!("Progress spinner disabled: {}", e);
            return None;
        }
    };
    let pb = ProgressBar::new_spinner();
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}
