use tracing::debug;

/// How an incoming `seq` relates to the last processed one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeqCheck {
    /// Nothing processed yet on this run.
    First,
    /// Exactly `last + 1`.
    Next,
    /// Ahead of `last + 1`. Relays number events globally, so gaps are normal.
    Gap { expected: i64 },
    /// At or behind `last`: already processed.
    Replay { last: i64 },
}

impl SeqCheck {
    pub fn is_replay(&self) -> bool {
        matches!(self, Self::Replay { .. })
    }
}

/// Tracks the last processed upstream sequence number.
///
/// The tracked value is the cursor sent on reconnect.
#[derive(Clone, Debug, Default)]
pub struct SequenceTracker {
    last: Option<i64>,
}

impl SequenceTracker {
    /// Start from a configured cursor, if any.
    pub fn new(cursor: Option<i64>) -> Self {
        Self { last: cursor }
    }

    pub fn check(&self, seq: i64) -> SeqCheck {
        match self.last {
            None => SeqCheck::First,
            Some(last) if seq <= last => SeqCheck::Replay { last },
            Some(last) if seq == last + 1 => SeqCheck::Next,
            Some(last) => SeqCheck::Gap { expected: last + 1 },
        }
    }

    /// Record `seq` as processed. Never moves backwards.
    pub fn advance(&mut self, seq: i64) {
        if self.last.map_or(true, |last| seq > last) {
            self.last = Some(seq);
        }
    }

    /// Check `seq` and advance past it unless it is a replay.
    ///
    /// Returns whether the event should be processed.
    pub fn accept(&mut self, seq: i64) -> bool {
        match self.check(seq) {
            SeqCheck::Replay { last } => {
                debug!(seq, last, "skipping replayed event");
                false
            }
            SeqCheck::Gap { expected } => {
                debug!(seq, expected, skipped = seq - expected, "sequence gap");
                self.advance(seq);
                true
            }
            SeqCheck::First | SeqCheck::Next => {
                self.advance(seq);
                true
            }
        }
    }

    /// Cursor to resume from.
    pub fn cursor(&self) -> Option<i64> {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_sequence_numbers() {
        let mut tracker = SequenceTracker::default();
        assert_eq!(tracker.check(10), SeqCheck::First);
        tracker.advance(10);
        assert_eq!(tracker.check(11), SeqCheck::Next);
        assert_eq!(tracker.check(15), SeqCheck::Gap { expected: 11 });
        assert_eq!(tracker.check(10), SeqCheck::Replay { last: 10 });
        assert_eq!(tracker.check(3), SeqCheck::Replay { last: 10 });
    }

    #[test]
    fn accept_skips_replays_and_takes_gaps() {
        let mut tracker = SequenceTracker::new(Some(100));
        assert!(!tracker.accept(100));
        assert!(!tracker.accept(99));
        assert_eq!(tracker.cursor(), Some(100));
        assert!(tracker.accept(105));
        assert_eq!(tracker.cursor(), Some(105));
        assert!(tracker.accept(106));
        assert_eq!(tracker.cursor(), Some(106));
    }

    #[test]
    fn advance_never_rewinds() {
        let mut tracker = SequenceTracker::default();
        tracker.advance(50);
        tracker.advance(20);
        assert_eq!(tracker.cursor(), Some(50));
    }
}
