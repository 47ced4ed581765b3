use serde::Deserialize;
use std::fmt;

/// Which end of the listing a worker starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Start on the first page and step to the next page
    Forward,

    /// Start on the last page and step to the previous page
    Backward,
}

impl Direction {
    /// Returns the other direction
    pub fn opposite(&self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Assigns a crawl direction to each worker ordinal
///
/// Ordinals below `split` walk in the `below` direction; every other ordinal
/// walks the opposite way. With the defaults (`split = 10`, `below =
/// Backward`) a 20-worker fleet sends ordinals 0-9 backward and 10-19 forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionPolicy {
    pub split: usize,
    pub below: Direction,
}

impl DirectionPolicy {
    pub fn new(split: usize, below: Direction) -> Self {
        Self { split, below }
    }

    /// Returns the direction for the worker with the given ordinal
    pub fn direction_for(&self, ordinal: usize) -> Direction {
        if ordinal < self.split {
            self.below
        } else {
            self.below.opposite()
        }
    }
}

impl Default for DirectionPolicy {
    fn default() -> Self {
        Self::new(10, Direction::Backward)
    }
}

/// Which row positions of a listing page a worker is responsible for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotAssignment {
    /// One row per page: `ordinal mod page_size`
    ///
    /// This is deliberately many-to-one, so a fleet larger than the page size
    /// shares the same slots across its direction groups.
    Single(usize),

    /// Every row of every page, in page order
    Sweep,
}

impl SlotAssignment {
    /// Builds the single-slot assignment for a worker ordinal
    pub fn for_ordinal(ordinal: usize, page_size: usize) -> Self {
        Self::Single(ordinal % page_size.max(1))
    }

    /// Returns the row indices to visit on each page, in order
    pub fn slots(&self, page_size: usize) -> Vec<usize> {
        match self {
            Self::Single(slot) => vec![*slot],
            Self::Sweep => (0..page_size).collect(),
        }
    }

    /// Number of records a fully processed page can contribute
    pub fn slots_per_page(&self, page_size: usize) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Sweep => page_size.max(1),
        }
    }
}
