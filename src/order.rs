//! Ordered lists mutated by drag-style moves.
//!
//! A move takes the item at `from` out of the list and inserts it at `to`,
//! where `to` is an index into the list *after* removal. Every move is a
//! permutation: items are never duplicated or lost.

use serde::Serialize;

/// Move `items[from]` so that it ends up at index `to`.
///
/// Out-of-range indices leave the list unchanged and return `false`.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    if from != to {
        let item = items.remove(from);
        items.insert(to, item);
    }
    true
}

/// 0-based page indices in the order they will be exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageOrderList {
    order: Vec<usize>,
}

impl PageOrderList {
    /// Natural order `[0, 1, …, page_count - 1]`.
    pub fn identity(page_count: usize) -> Self {
        Self {
            order: (0..page_count).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    /// See [`move_item`].
    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        move_item(&mut self.order, from, to)
    }

    /// Back to natural order.
    pub fn reset(&mut self) {
        let n = self.order.len();
        self.order = (0..n).collect();
    }

    pub fn is_identity(&self) -> bool {
        self.order.iter().enumerate().all(|(i, &p)| i == p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn move_last_to_front() {
        let mut list = PageOrderList::identity(4);
        assert!(list.move_item(3, 0));
        assert_eq!(list.as_slice(), &[3, 0, 1, 2]);
    }

    #[test]
    fn move_first_to_back() {
        let mut list = PageOrderList::identity(4);
        list.move_item(0, 3);
        assert_eq!(list.as_slice(), &[1, 2, 3, 0]);
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut list = PageOrderList::identity(3);
        assert!(!list.move_item(3, 0));
        assert!(!list.move_item(0, 9));
        assert!(list.is_identity());
    }

    #[test]
    fn reset_restores_identity() {
        let mut list = PageOrderList::identity(5);
        list.move_item(4, 1);
        assert!(!list.is_identity());
        list.reset();
        assert!(list.is_identity());
    }

    proptest! {
        #[test]
        fn moves_are_permutations(
            n in 1usize..40,
            moves in prop::collection::vec((0usize..40, 0usize..40), 0..30),
        ) {
            let mut list = PageOrderList::identity(n);
            for (from, to) in moves {
                list.move_item(from % n, to % n);
            }
            let mut sorted = list.as_slice().to_vec();
            sorted.sort_unstable();
            prop_assert_eq!(sorted, (0..n).collect::<Vec<_>>());
        }

        #[test]
        fn moved_item_lands_at_target(n in 1usize..30, from in 0usize..30, to in 0usize..30) {
            let (from, to) = (from % n, to % n);
            let mut list = PageOrderList::identity(n);
            list.move_item(from, to);
            prop_assert_eq!(list.as_slice()[to], from);
        }
    }
}
