//! Temporary identifier allocation.

/// Source of numeric suffixes for temporary identifiers (`c<suffix>`).
///
/// Any `FnMut() -> u64` closure qualifies, which lets callers inject a
/// deterministic or externally coordinated allocator.
pub trait TempIdSource {
    /// Produce the next suffix.
    fn next_suffix(&mut self) -> u64;
}

impl<F> TempIdSource for F
where
    F: FnMut() -> u64,
{
    fn next_suffix(&mut self) -> u64 {
        self()
    }
}

/// Default allocator: an instance-scoped counter starting at zero.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    next: u64,
}

impl Sequence {
    /// Start counting from `first`.
    #[must_use]
    pub const fn starting_at(first: u64) -> Self {
        Self { next: first }
    }
}

impl TempIdSource for Sequence {
    fn next_suffix(&mut self) -> u64 {
        let current = self.next;
        self.next = self.next.wrapping_add(1);
        current
    }
}
