//! Static operator roster.

use crate::leads::OperatorId;

/// Operators who receive notifications and may claim leads.
///
/// Loaded once at startup; never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorRoster {
    operators: Vec<OperatorId>,
}

impl OperatorRoster {
    /// Build a roster, dropping duplicate ids while keeping order.
    pub fn new(operators: impl IntoIterator<Item = OperatorId>) -> Self {
        let mut unique = Vec::new();
        for id in operators {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        Self { operators: unique }
    }

    pub fn contains(&self, id: OperatorId) -> bool {
        self.operators.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = OperatorId> + '_ {
        self.operators.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_are_dropped() {
        let roster = OperatorRoster::new([3, 1, 3, 2, 1]);
        assert_eq!(roster.iter().collect::<Vec<_>>(), vec![3, 1, 2]);
        assert_eq!(roster.len(), 3);
    }

    #[test]
    fn membership() {
        let roster = OperatorRoster::new([10, 20]);
        assert!(roster.contains(10));
        assert!(!roster.contains(30));
        assert!(OperatorRoster::default().is_empty());
    }
}
