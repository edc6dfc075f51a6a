//! User-facing notices
//!
//! The core only emits categorized notices; how they reach the user (toast,
//! terminal, log) is up to the [`Notifier`] it is given.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    /// Empty input or an empty result, not a failure
    Validation,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub description: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { kind, title: title.into(), description: description.into() }
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeKind::Success, title, description)
    }

    pub fn validation(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeKind::Validation, title, description)
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NoticeKind::Error, title, description)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.description)
    }
}

pub trait Notifier {
    fn notify(&mut self, notice: Notice);
}

/// Forwards notices to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, notice: Notice) {
        match notice.kind {
            NoticeKind::Success => log::info!("{notice}"),
            NoticeKind::Validation => log::warn!("{notice}"),
            NoticeKind::Error => log::error!("{notice}"),
        }
    }
}

/// Keeps every notice in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    pub notices: Vec<Notice>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&Notice> {
        self.notices.last()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

impl<N: Notifier + ?Sized> Notifier for &mut N {
    fn notify(&mut self, notice: Notice) {
        (**self).notify(notice);
    }
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&mut self, notice: Notice) {
        (**self).notify(notice);
    }
}
