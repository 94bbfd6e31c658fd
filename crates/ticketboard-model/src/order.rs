//! Dense ordering
//!
//! Tickets and steps share one algorithm: the position of an item in its
//! sequence *is* its `order_index`. Every mutation ends with a full re-walk
//! that assigns `order_index = position`, and reports which items changed so
//! the caller can persist exactly those.
//!
//! Drag drops are resolved by [`drop_side`]: the drop coordinate is compared
//! against the midpoint of the target along the sequence's axis.

use crate::error::ValidationError;
use std::fmt::Debug;

/// Item carrying an `order_index`
pub trait Ordered {
    /// Identifier type
    type Id: Copy + Eq + Debug;

    /// Item identifier
    fn id(&self) -> Self::Id;

    /// Current index
    fn order_index(&self) -> u32;

    /// Overwrite the index
    fn set_order_index(&mut self, index: u32);
}

/// An index that changed during a re-walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexChange<Id> {
    /// Item that moved
    pub id: Id,
    /// Index before the re-walk
    pub from: u32,
    /// Index after the re-walk
    pub to: u32,
}

/// Convert a sequence position to an `order_index`
#[inline]
#[must_use]
pub fn to_index(position: usize) -> u32 {
    u32::try_from(position).unwrap_or(u32::MAX)
}

/// Assign `order_index = position` to every item
///
/// Returns the items whose index actually changed.
pub fn reindex<T: Ordered>(seq: &mut [T]) -> Vec<IndexChange<T::Id>> {
    let mut changes = Vec::new();
    for (position, item) in seq.iter_mut().enumerate() {
        let to = to_index(position);
        let from = item.order_index();
        if from != to {
            item.set_order_index(to);
            changes.push(IndexChange {
                id: item.id(),
                from,
                to,
            });
        }
    }
    changes
}

/// Check `order_index` values are exactly `0..len` in sequence order
#[must_use]
pub fn is_dense<T: Ordered>(seq: &[T]) -> bool {
    seq.iter()
        .enumerate()
        .all(|(position, item)| item.order_index() == to_index(position))
}

/// Position of an item in the sequence
#[must_use]
pub fn position_of<T: Ordered>(seq: &[T], id: T::Id) -> Option<usize> {
    seq.iter().position(|item| item.id() == id)
}

/// Append at the end with `order_index = len`
///
/// Returns the index assigned.
pub fn append<T: Ordered>(seq: &mut Vec<T>, mut item: T) -> u32 {
    let index = to_index(seq.len());
    item.set_order_index(index);
    seq.push(item);
    index
}

/// Insert at `index` (clamped to `[0, len]`) and close up the sequence
///
/// The returned changes cover the shifted items, plus the inserted one if it
/// arrived carrying a different index. Inserting at the end shifts nothing
/// and goes through [`append`].
pub fn insert_at<T: Ordered>(seq: &mut Vec<T>, item: T, index: usize) -> Vec<IndexChange<T::Id>> {
    if index >= seq.len() {
        let (id, from) = (item.id(), item.order_index());
        let to = append(seq, item);
        return if from == to {
            Vec::new()
        } else {
            vec![IndexChange { id, from, to }]
        };
    }
    seq.insert(index, item);
    reindex(seq)
}

/// Move the item at `from` to `to`, clamped to `[0, len-1]`
///
/// # Errors
/// - `ValidationError::IndexOutOfRange` if `from` is not a position
pub fn move_item<T: Ordered>(
    seq: &mut Vec<T>,
    from: usize,
    to: usize,
) -> Result<Vec<IndexChange<T::Id>>, ValidationError> {
    if from >= seq.len() {
        return Err(ValidationError::IndexOutOfRange {
            index: from,
            len: seq.len(),
        });
    }

    let item = seq.remove(from);
    let to = to.min(seq.len());
    seq.insert(to, item);
    Ok(reindex(seq))
}

/// Remove an item and close the gap it leaves
pub fn remove_dense<T: Ordered>(seq: &mut Vec<T>, id: T::Id) -> Option<(T, Vec<IndexChange<T::Id>>)> {
    let position = position_of(seq, id)?;
    let removed = seq.remove(position);
    Some((removed, reindex(seq)))
}

/// Target of a one-position move, or `None` past either end
#[must_use]
pub fn step_target(position: usize, len: usize, delta: isize) -> Option<usize> {
    let target = position.checked_add_signed(delta)?;
    (target < len && target != position).then_some(target)
}

/// Layout axis of a sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// Items laid out left to right (tickets)
    Horizontal,
    /// Items laid out top to bottom (steps)
    Vertical,
}

/// Pointer position at drop time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

/// Bounding box of the item under the pointer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Left edge
    pub x: f64,
    /// Top edge
    pub y: f64,
    /// Extent along x
    pub width: f64,
    /// Extent along y
    pub height: f64,
}

/// Which side of the target a dragged item lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropSide {
    /// Land in front of the target
    Before,
    /// Land behind the target
    After,
}

/// Decide before/after by comparing the drop point with the target midpoint
#[must_use]
pub fn drop_side(axis: Axis, point: Point, target: Rect) -> DropSide {
    let (coord, midpoint) = match axis {
        Axis::Horizontal => (point.x, target.x + target.width / 2.0),
        Axis::Vertical => (point.y, target.y + target.height / 2.0),
    };
    if coord < midpoint {
        DropSide::Before
    } else {
        DropSide::After
    }
}

/// Final position of an item dragged from `from` onto `target`
///
/// Positions are in the sequence as it was before the drag. The result is
/// suitable for [`move_item`].
#[must_use]
pub fn drop_destination(from: usize, target: usize, side: DropSide) -> usize {
    let target = if target > from { target - 1 } else { target };
    match side {
        DropSide::Before => target,
        DropSide::After => target + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: u32,
        index: u32,
    }

    impl Ordered for Item {
        type Id = u32;

        fn id(&self) -> u32 {
            self.id
        }

        fn order_index(&self) -> u32 {
            self.index
        }

        fn set_order_index(&mut self, index: u32) {
            self.index = index;
        }
    }

    fn items(n: u32) -> Vec<Item> {
        (0..n).map(|i| Item { id: i, index: i }).collect()
    }

    fn ids(seq: &[Item]) -> Vec<u32> {
        seq.iter().map(|i| i.id).collect()
    }

    #[test]
    fn move_front_renumbers_everything_before_source() {
        let mut seq = items(5);
        let changes = move_item(&mut seq, 3, 0).unwrap();

        assert_eq!(ids(&seq), vec![3, 0, 1, 2, 4]);
        assert!(is_dense(&seq));
        let changed: Vec<u32> = changes.iter().map(|c| c.id).collect();
        assert_eq!(changed, vec![3, 0, 1, 2]);
    }

    #[test]
    fn move_clamps_destination() {
        let mut seq = items(3);
        move_item(&mut seq, 0, 99).unwrap();
        assert_eq!(ids(&seq), vec![1, 2, 0]);
    }

    #[test]
    fn move_rejects_bad_source() {
        let mut seq = items(3);
        let err = move_item(&mut seq, 3, 0).unwrap_err();
        assert_eq!(err, ValidationError::IndexOutOfRange { index: 3, len: 3 });
        assert_eq!(ids(&seq), vec![0, 1, 2]);
    }

    #[test]
    fn move_in_place_changes_nothing() {
        let mut seq = items(4);
        assert!(move_item(&mut seq, 2, 2).unwrap().is_empty());
    }

    #[test]
    fn remove_closes_gap() {
        let mut seq = items(4);
        let (removed, changes) = remove_dense(&mut seq, 1).unwrap();

        assert_eq!(removed.id, 1);
        assert_eq!(ids(&seq), vec![0, 2, 3]);
        assert!(is_dense(&seq));
        assert_eq!(changes.len(), 2);
        assert!(remove_dense(&mut seq, 42).is_none());
    }

    #[test]
    fn append_uses_length() {
        let mut seq = items(2);
        let index = append(&mut seq, Item { id: 9, index: 77 });
        assert_eq!(index, 2);
        assert!(is_dense(&seq));
    }

    #[test]
    fn insert_reports_shifted_items() {
        let mut seq = items(3);
        let changes = insert_at(&mut seq, Item { id: 9, index: 1 }, 1);

        assert_eq!(ids(&seq), vec![0, 9, 1, 2]);
        assert!(is_dense(&seq));
        assert!(changes.iter().all(|c| c.id != 9));
        assert_eq!(changes.len(), 2);

        let changes = insert_at(&mut seq, Item { id: 8, index: 40 }, 0);
        assert_eq!(changes[0], IndexChange { id: 8, from: 40, to: 0 });
    }

    #[test]
    fn insert_at_end_appends_without_shifting() {
        let mut seq = items(3);
        assert!(insert_at(&mut seq, Item { id: 9, index: 3 }, 3).is_empty());

        let changes = insert_at(&mut seq, Item { id: 8, index: 1 }, 50);
        assert_eq!(ids(&seq), vec![0, 1, 2, 9, 8]);
        assert!(is_dense(&seq));
        assert_eq!(changes, vec![IndexChange { id: 8, from: 1, to: 4 }]);
    }

    #[test]
    fn step_target_stops_at_ends() {
        assert_eq!(step_target(0, 3, -1), None);
        assert_eq!(step_target(2, 3, 1), None);
        assert_eq!(step_target(1, 3, 1), Some(2));
        assert_eq!(step_target(1, 3, -1), Some(0));
    }

    #[test]
    fn drop_side_uses_axis_midpoint() {
        let rect = Rect {
            x: 100.0,
            y: 0.0,
            width: 50.0,
            height: 20.0,
        };
        let left = Point { x: 110.0, y: 19.0 };
        let right = Point { x: 130.0, y: 1.0 };

        assert_eq!(drop_side(Axis::Horizontal, left, rect), DropSide::Before);
        assert_eq!(drop_side(Axis::Horizontal, right, rect), DropSide::After);
        assert_eq!(drop_side(Axis::Vertical, left, rect), DropSide::After);
        assert_eq!(drop_side(Axis::Vertical, right, rect), DropSide::Before);
    }

    #[test]
    fn drop_destination_accounts_for_removal() {
        // dragging 0 after 2 in [0,1,2,3] yields [1,2,0,3]
        assert_eq!(drop_destination(0, 2, DropSide::After), 2);
        // dragging 3 before 1 yields [0,3,1,2]
        assert_eq!(drop_destination(3, 1, DropSide::Before), 1);
        assert_eq!(drop_destination(3, 1, DropSide::After), 2);
    }

    proptest! {
        #[test]
        fn prop_moves_and_removals_stay_dense(
            len in 1u32..20,
            ops in prop::collection::vec((any::<bool>(), 0usize..25, 0usize..25), 0..40)
        ) {
            let mut seq = items(len);
            for (remove, a, b) in ops {
                if seq.is_empty() {
                    break;
                }
                if remove {
                    let id = seq[a % seq.len()].id;
                    remove_dense(&mut seq, id);
                } else {
                    let from = a % seq.len();
                    move_item(&mut seq, from, b).unwrap();
                }
                prop_assert!(is_dense(&seq));
            }
        }
    }
}
