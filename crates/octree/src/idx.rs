use std::fmt::Debug;

pub type Idx = u32;

pub const NULL_ID: Idx = Idx::MAX;

/// Node index with a sentinel instead of a tag, so nodes stay small.
#[derive(Copy, Clone, Eq, PartialEq)]
pub struct OptionalIdx(Idx);

impl Default for OptionalIdx {
    fn default() -> Self {
        Self::NONE
    }
}

impl Debug for OptionalIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_null() {
            write!(f, "NodeId::NULL")
        } else {
            write!(f, "NodeId({})", self.0)
        }
    }
}

impl OptionalIdx {
    pub const NONE: Self = Self(NULL_ID);

    #[must_use]
    pub const fn inner(self) -> Option<Idx> {
        if self.is_null() { None } else { Some(self.0) }
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == NULL_ID
    }

    #[must_use]
    pub const fn some(id: Idx) -> Self {
        debug_assert!(id != NULL_ID);
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_null() {
        assert!(OptionalIdx::NONE.is_null());
        assert_eq!(OptionalIdx::default(), OptionalIdx::NONE);
        assert_eq!(OptionalIdx::NONE.inner(), None);
    }

    #[test]
    fn some_round_trips() {
        let idx = OptionalIdx::some(7);
        assert!(!idx.is_null());
        assert_eq!(idx.inner(), Some(7));
        assert_eq!(format!("{idx:?}"), "NodeId(7)");
    }
}
