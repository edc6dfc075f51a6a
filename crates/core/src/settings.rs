use crate::deferred::DEFAULT_HIGHLIGHT_DELAY;
use crate::search::{MatchEngine, DEFAULT_CONTEXT_WINDOW};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_EXPORT_FILE_NAME: &str = "pdf_search_results.csv";

/// User-tunable settings; missing fields fall back to their defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Characters of context on each side of a match
    pub context_window: usize,
    pub highlight_delay_ms: u64,
    pub default_zoom: f32,
    pub zoom_step: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Export file name used when several documents are loaded
    pub export_file_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            context_window: DEFAULT_CONTEXT_WINDOW,
            highlight_delay_ms: DEFAULT_HIGHLIGHT_DELAY.as_millis() as u64,
            default_zoom: 1.2,
            zoom_step: 0.2,
            min_zoom: 0.6,
            max_zoom: 3.0,
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_owned(),
        }
    }
}

impl Settings {
    pub fn highlight_delay(&self) -> Duration {
        Duration::from_millis(self.highlight_delay_ms)
    }

    pub fn match_engine(&self) -> MatchEngine {
        MatchEngine::new(self.context_window)
    }
}
