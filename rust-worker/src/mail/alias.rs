//! Sender alias rotation.

/// Non-empty, ordered pool of sender identities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasPool {
    aliases: Vec<String>,
}

impl AliasPool {
    /// Returns `None` when there is nothing to rotate through.
    pub fn new(aliases: Vec<String>) -> Option<Self> {
        if aliases.is_empty() {
            None
        } else {
            Some(Self { aliases })
        }
    }

    /// Alias for the recipient at store position `row`.
    ///
    /// Keyed by row position rather than by successful sends, so a failed
    /// row still consumes its slot in the rotation.
    pub fn select(&self, row: usize) -> &str {
        &self.aliases[row % self.aliases.len()]
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
