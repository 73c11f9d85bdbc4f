use std::fmt;

use serde::{Deserialize, Serialize};

/// Chain time with one-second resolution.
///
/// Block intervals and maintenance periods are whole seconds, so slot
/// arithmetic stays in integer space and replays identically everywhere.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlockTimestamp(pub u32);

impl BlockTimestamp {
    pub const fn from_seconds(secs: u32) -> Self {
        Self(secs)
    }

    pub fn seconds(&self) -> u32 {
        self.0
    }

    pub fn saturating_add_seconds(&self, secs: u32) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Whole seconds from `earlier` to `self`; zero if `earlier` is later.
    pub fn seconds_since(&self, earlier: BlockTimestamp) -> u32 {
        self.0.saturating_sub(earlier.0)
    }

    /// Round down to the nearest multiple of `interval` seconds.
    pub fn align_to_interval(&self, interval: u32) -> Self {
        Self(self.0 / interval * interval)
    }
}

impl fmt::Display for BlockTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl fmt::Debug for BlockTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_rounds_down() {
        assert_eq!(
            BlockTimestamp(17).align_to_interval(5),
            BlockTimestamp(15)
        );
        assert_eq!(BlockTimestamp(15).align_to_interval(5), BlockTimestamp(15));
    }

    #[test]
    fn seconds_since_saturates() {
        let early = BlockTimestamp(100);
        let late = BlockTimestamp(130);
        assert_eq!(late.seconds_since(early), 30);
        assert_eq!(early.seconds_since(late), 0);
    }

    #[test]
    fn ordering() {
        assert!(BlockTimestamp(1) < BlockTimestamp(2));
    }
}
