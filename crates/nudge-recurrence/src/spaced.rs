//! Spaced-repetition offset policy.

/// Maps "how many times has this reminder fired" to "how many days until
/// the next firing".
///
/// Index `n` of the offset sequence is used after the `n`th firing, and the
/// last offset repeats once the sequence is exhausted. Index 0 is the seed
/// offset used when the reminder is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpacedPolicy<'a> {
    offsets: &'a [u32],
}

impl<'a> SpacedPolicy<'a> {
    /// Create a policy over an offset sequence.
    pub fn new(offsets: &'a [u32]) -> Self {
        Self { offsets }
    }

    /// Offset index used after `firings` prior firings.
    ///
    /// Returns `None` for an empty sequence.
    pub fn index_for(&self, firings: u32) -> Option<usize> {
        let last = self.offsets.len().checked_sub(1)?;
        Some((firings as usize).min(last))
    }

    /// Raw configured offset for `firings` prior firings.
    pub fn offset_for(&self, firings: u32) -> Option<u32> {
        self.index_for(firings).map(|i| self.offsets[i])
    }

    /// Days to wait before the next firing.
    ///
    /// The seed (`firings == 0`) may be zero, meaning "today". After a
    /// reminder has fired at least once the gap is at least one day, so a
    /// zero offset mid-sequence cannot produce a trigger that is already due.
    pub fn days_until_next(&self, firings: u32) -> Option<u32> {
        let offset = self.offset_for(firings)?;
        if firings == 0 {
            Some(offset)
        } else {
            Some(offset.max(1))
        }
    }
}
