//! Navigator traits and error types
//!
//! This module defines the interface a rendering session must provide to the
//! crawl worker, together with the error type every navigator returns.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// How to find an element on the rendered page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locator {
    /// A CSS selector, e.g. `table.tb_list tr[onclick]`
    Css(String),

    /// An XPath expression, e.g. `//a[@title='next']`
    XPath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }

    /// The raw selector or expression text
    pub fn expression(&self) -> &str {
        match self {
            Self::Css(s) | Self::XPath(s) => s,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Css(s) => write!(f, "css({})", s),
            Self::XPath(s) => write!(f, "xpath({})", s),
        }
    }
}

/// The condition a wait must observe before it returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// At least one matching element is in the DOM; returns the first
    Present,

    /// At least one matching element is in the DOM; returns all of them
    AllPresent,

    /// The first matching element is displayed and enabled
    Clickable,

    /// No matching element is displayed (absent counts); returns nothing
    Invisible,
}

/// Errors a navigator can report
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavError {
    #[error("Timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    #[error("Element not found: {0}")]
    NotFound(String),

    #[error("Stale element: {0}")]
    StaleElement(String),

    #[error("Rendering session closed: {0}")]
    SessionClosed(String),

    #[error("Interrupted by operator")]
    Interrupted,

    #[error("Driver error: {0}")]
    Driver(String),
}

impl NavError {
    /// Returns true if the error ends the worker rather than the current row
    ///
    /// Only a closed session and an operator interrupt are fatal. Everything
    /// else is the flaky-UI kind of failure a worker recovers from by moving
    /// on to the next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SessionClosed(_) | Self::Interrupted)
    }

    /// Classifies a raw driver error message
    ///
    /// WebDriver servers report failures as free-form text; the W3C error
    /// codes are embedded in it (`no such window`, `invalid session id`,
    /// `stale element reference`, ...).
    pub fn from_driver_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();

        if SESSION_CLOSED_MARKERS.iter().any(|m| lower.contains(m)) {
            Self::SessionClosed(message)
        } else if lower.contains("stale element") {
            Self::StaleElement(message)
        } else if lower.contains("no such element") {
            Self::NotFound(message)
        } else if lower.contains("timeout") || lower.contains("timed out") {
            Self::Timeout {
                what: message,
                after: Duration::ZERO,
            }
        } else {
            Self::Driver(message)
        }
    }
}

const SESSION_CLOSED_MARKERS: &[&str] = &[
    "no such window",
    "target window already closed",
    "invalid session id",
    "session deleted",
    "session not created",
    "disconnected",
    "chrome not reachable",
    "no such session",
];

/// Result type for navigator operations
pub type NavResult<T> = Result<T, NavError>;

/// A live rendering session owned by exactly one worker
///
/// All operations may block the calling worker for up to their timeout. None
/// of them retry; retry policy belongs to the worker loop.
#[async_trait]
pub trait PageNavigator: Send {
    /// Handle to an element on the current page
    type Element: Send + Sync;

    /// Loads a URL in the session
    async fn go(&mut self, url: &str) -> NavResult<()>;

    /// Waits until `mode` holds for `locator`, or fails with `NavError::Timeout`
    ///
    /// `Present` and `Clickable` return exactly one element, `AllPresent`
    /// returns every match in document order, `Invisible` returns none.
    async fn wait(
        &mut self,
        locator: &Locator,
        mode: WaitMode,
        timeout: Duration,
    ) -> NavResult<Vec<Self::Element>>;

    /// Clicks an element previously returned by `wait`
    async fn click(&mut self, element: &Self::Element) -> NavResult<()>;

    /// Reads the visible text of an element, or of its first descendant
    /// matching `child`
    async fn element_text(
        &mut self,
        element: &Self::Element,
        child: Option<&Locator>,
    ) -> NavResult<String>;

    /// Returns the markup of the current page
    async fn current_markup(&mut self) -> NavResult<String>;

    /// Navigates one step back in history
    async fn go_back(&mut self) -> NavResult<()>;

    /// Closes the session; later calls fail with `SessionClosed`
    async fn shutdown(&mut self) -> NavResult<()>;
}

/// Opens one rendering session per worker
#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Navigator: PageNavigator + 'static;

    async fn open(&self, ordinal: usize) -> NavResult<Self::Navigator>;
}
