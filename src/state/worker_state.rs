/// Worker state definitions for tracking crawl progress
///
/// This module defines the lifecycle states of a crawl worker and the reasons
/// a worker can leave its crawl loop.
use std::fmt;

/// Represents the current lifecycle state of a crawl worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    // ===== Setup States =====
    /// Opening the listing and loading the partition
    Starting,

    /// Replaying bulk page jumps to reach the resume position
    Positioning,

    // ===== Active State =====
    /// Walking listing pages and capturing records
    Iterating,

    // ===== Shutdown States =====
    /// The loop has ended; the rendering session is being released
    Draining,

    /// The session has been released and the worker is done
    Terminated,
}

impl WorkerState {
    /// Returns true if this is the terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminated)
    }

    /// Returns true if the worker is still inside its crawl loop
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Starting | Self::Positioning | Self::Iterating)
    }

    /// Checks whether moving from this state to `next` is a legal transition
    ///
    /// The lifecycle only moves forward:
    /// `Starting → Positioning → Iterating → Draining → Terminated`.
    /// Any active state may drop straight to `Draining` when the loop ends
    /// early (fatal error, interrupt, end of listing).
    pub fn can_transition_to(&self, next: WorkerState) -> bool {
        matches!(
            (self, next),
            (Self::Starting, Self::Positioning)
                | (Self::Positioning, Self::Iterating)
                | (Self::Starting, Self::Draining)
                | (Self::Positioning, Self::Draining)
                | (Self::Iterating, Self::Draining)
                | (Self::Draining, Self::Terminated)
        )
    }

    /// Short lowercase label used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Positioning => "positioning",
            Self::Iterating => "iterating",
            Self::Draining => "draining",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a worker left its crawl loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The page-advance control was missing or not clickable
    EndOfListing,

    /// The operator interrupted the run
    Interrupted,

    /// The browser window or session was closed underneath the worker
    SessionClosed(String),

    /// The resume jump sequence could not be completed
    PositioningFailed(String),

    /// The listing could not be opened or the partition could not be loaded
    StartFailed(String),
}

impl ExitReason {
    /// Returns true if the worker finished its traversal normally
    pub fn is_normal(&self) -> bool {
        matches!(self, Self::EndOfListing)
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EndOfListing => write!(f, "end of listing"),
            Self::Interrupted => write!(f, "interrupted"),
            Self::SessionClosed(msg) => write!(f, "session closed: {}", msg),
            Self::PositioningFailed(msg) => write!(f, "positioning failed: {}", msg),
            Self::StartFailed(msg) => write!(f, "start failed: {}", msg),
        }
    }
}
