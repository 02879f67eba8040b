//! Single-assignment memoization cell.

/// A value that is resolved at most once per invocation.
///
/// Used for the workflow id and the run id: once a resolver succeeds the
/// result is kept and every later lookup reuses it without a remote call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Memo<T> {
    /// Nothing resolved yet.
    #[default]
    Unresolved,
    /// Resolved; never changes afterwards.
    Resolved(T),
}

impl<T> Memo<T> {
    /// Returns the resolved value, if any.
    pub fn get(&self) -> Option<&T> {
        match self {
            Self::Unresolved => None,
            Self::Resolved(value) => Some(value),
        }
    }

    /// Stores `value` unless the cell is already resolved, and returns the
    /// value held afterwards. The first assignment wins.
    pub fn resolve(&mut self, value: T) -> &T {
        if let Self::Unresolved = self {
            *self = Self::Resolved(value);
        }
        match self {
            Self::Resolved(held) => held,
            Self::Unresolved => unreachable!("memo assigned above"),
        }
    }
}
