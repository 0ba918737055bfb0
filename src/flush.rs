//! Flush policies.

/// Controls when a [`Shelf`](crate::Shelf) makes its state durable.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Persist after every mutation. Safest, but most I/O: buffered shelves
    /// rewrite the whole file and SQLite shelves commit each write.
    Immediate,
    /// Only persist when you call `persist()` yourself, or when a scope ends.
    #[default]
    Manual,
}

impl FlushPolicy {
    /// `true` if mutations trigger a persist on their own.
    pub fn persists_on_write(self) -> bool {
        matches!(self, FlushPolicy::Immediate)
    }
}
