//! Deferred highlight passes
//!
//! Page, zoom and annotation changes each ask for a highlight pass, but the
//! renderer lays out its text layer asynchronously. Requests are debounced by
//! a fixed delay and superseded by later ones: only the most recent pending
//! pass runs, and only once the text layer for its page reports ready.
//!
//! Time is passed in explicitly so callers drive the clock.

use crate::text_layer::{PageTarget, RenderedTextLayer};
use std::time::{Duration, Instant};

/// Delay between the last request and the pass running
pub const DEFAULT_HIGHLIGHT_DELAY: Duration = Duration::from_millis(100);

/// A highlight pass that is due to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightPass {
    pub target: PageTarget,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingPass {
    pass: HighlightPass,
    due: Instant,
}

#[derive(Debug, Clone)]
pub struct HighlightScheduler {
    delay: Duration,
    generation: u64,
    pending: Option<PendingPass>,
}

impl Default for HighlightScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_HIGHLIGHT_DELAY)
    }
}

impl HighlightScheduler {
    pub fn new(delay: Duration) -> Self {
        Self { delay, generation: 0, pending: None }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Generation of the most recent request
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Ask for a pass over `target`, replacing any pass still waiting
    pub fn request(&mut self, target: PageTarget, now: Instant) -> u64 {
        self.generation += 1;
        self.pending = Some(PendingPass {
            pass: HighlightPass { target, generation: self.generation },
            due: now + self.delay,
        });
        self.generation
    }

    /// Drop the pending pass, if any
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Take the pending pass once its delay has elapsed and `layer` is the
    /// ready text layer of the requested page
    ///
    /// Returns `None` and keeps the request pending otherwise.
    pub fn poll(&mut self, now: Instant, layer: Option<&RenderedTextLayer>) -> Option<HighlightPass> {
        let pending = self.pending?;
        if now < pending.due {
            return None;
        }

        let layer = layer?;
        if !layer.is_ready() || layer.target() != pending.pass.target {
            return None;
        }

        self.pending = None;
        Some(pending.pass)
    }

    /// Whether a pass taken earlier is still the latest request
    pub fn is_current(&self, pass: &HighlightPass) -> bool {
        pass.generation == self.generation
    }
}
