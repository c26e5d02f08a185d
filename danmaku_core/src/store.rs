// Copyright 2026 the Danmaku Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Time-sorted comment buffer with an admission cursor.
//!
//! The buffer is always sorted ascending by `time`; comments with equal times
//! keep their insertion order. The cursor is the index of the next comment
//! the frame loop will consider for admission. It only moves backwards on an
//! explicit [`seek`](CommentStore::seek) or
//! [`replace_all`](CommentStore::replace_all).

use alloc::vec::Vec;
use core::ops::Range;

use crate::comment::Comment;

/// Ordered comment buffer plus admission cursor.
#[derive(Clone, Debug, Default)]
pub struct CommentStore {
    comments: Vec<Comment>,
    cursor: usize,
}

impl CommentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffered comments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.comments.len()
    }

    /// Returns `true` if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// The buffered comments in time order.
    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    /// Index of the next comment to consider for admission.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of comments whose `time <= key`.
    ///
    /// Inserting at this index keeps equal times in insertion order.
    #[must_use]
    pub fn insertion_index(&self, key: f64) -> usize {
        self.comments.partition_point(|c| c.time <= key)
    }

    /// Inserts a comment in time order and returns its index.
    ///
    /// An insertion before the cursor shifts the cursor so that it keeps
    /// pointing at the same comment.
    pub fn insert(&mut self, comment: Comment) -> usize {
        let index = self.insertion_index(comment.time);
        self.comments.insert(index, comment);
        if index < self.cursor {
            self.cursor += 1;
        }
        index
    }

    /// Replaces the whole buffer.
    ///
    /// `comments` is sorted (stably) and the cursor placed after every comment
    /// due at or before `current_time`.
    pub fn replace_all(&mut self, mut comments: Vec<Comment>, current_time: f64) {
        sort_by_time(&mut comments);
        self.comments = comments;
        self.cursor = self.insertion_index(current_time);
    }

    /// Repositions the cursor for a seek to `time`.
    ///
    /// The cursor lands one before the insertion index so that a comment due
    /// exactly now is reconsidered. Returns the insertion index.
    pub fn seek(&mut self, time: f64) -> usize {
        let index = self.insertion_index(time);
        self.cursor = index.saturating_sub(1);
        index
    }

    /// Sets the cursor, clamped to the buffer length.
    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.comments.len());
    }

    /// Returns the comment under the cursor if it is due strictly before
    /// `current_time`.
    #[must_use]
    pub fn next_due(&self, current_time: f64) -> Option<&Comment> {
        self.comments
            .get(self.cursor)
            .filter(|c| c.time < current_time)
    }

    /// Moves the cursor past the current comment.
    pub fn advance(&mut self) {
        if self.cursor < self.comments.len() {
            self.cursor += 1;
        }
    }

    /// Index range of comments with `start <= time <= end`.
    #[must_use]
    pub fn backfill_range(&self, start: f64, end: f64) -> Range<usize> {
        let lo = self.comments.partition_point(|c| c.time < start);
        let hi = self.insertion_index(end).max(lo);
        lo..hi
    }

    /// Drops every comment and resets the cursor.
    pub fn clear(&mut self) {
        self.comments.clear();
        self.cursor = 0;
    }
}

/// Stable ascending sort by `time`.
pub(crate) fn sort_by_time(comments: &mut [Comment]) {
    comments.sort_by(|a, b| a.time.total_cmp(&b.time));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comment::{CommentId, RawComment};
    use alloc::vec;
    use alloc::vec::Vec;

    fn comment(id: u64, time: f64) -> Comment {
        Comment::normalize(RawComment::new("c", time), CommentId(id), 0.0).unwrap()
    }

    fn times(store: &CommentStore) -> Vec<f64> {
        store.comments().iter().map(|c| c.time).collect()
    }

    #[test]
    fn insertion_index_counts_less_or_equal() {
        let mut store = CommentStore::new();
        store.replace_all(vec![comment(0, 1.0), comment(1, 2.0), comment(2, 2.0)], 0.0);
        assert_eq!(store.insertion_index(0.5), 0);
        assert_eq!(store.insertion_index(1.0), 1);
        assert_eq!(store.insertion_index(2.0), 3, "equal keys sort after");
        assert_eq!(store.insertion_index(9.0), 3);
    }

    #[test]
    fn arbitrary_insertion_order_stays_sorted() {
        let mut store = CommentStore::new();
        let input = [5.0, 1.0, 3.0, 3.0, 0.0, 9.5, 2.25, 3.0, 7.0];
        for (i, &t) in input.iter().enumerate() {
            store.insert(comment(i as u64, t));
        }
        let got = times(&store);
        assert!(got.windows(2).all(|w| w[0] <= w[1]), "sorted: {got:?}");

        // Equal times keep insertion order.
        let threes: Vec<u64> = store
            .comments()
            .iter()
            .filter(|c| c.time == 3.0)
            .map(|c| c.id.0)
            .collect();
        assert_eq!(threes, [2, 3, 7]);
    }

    #[test]
    fn insert_before_cursor_shifts_cursor() {
        let mut store = CommentStore::new();
        store.replace_all(vec![comment(0, 1.0), comment(1, 2.0), comment(2, 3.0)], 2.5);
        assert_eq!(store.cursor(), 2);

        store.insert(comment(3, 0.5));
        assert_eq!(store.cursor(), 3, "cursor follows the comment at t=3");
        assert_eq!(store.comments()[store.cursor()].id, CommentId(2));

        store.insert(comment(4, 10.0));
        assert_eq!(store.cursor(), 3, "insert after cursor leaves it alone");
    }

    #[test]
    fn replace_all_sorts_and_positions_cursor() {
        let mut store = CommentStore::new();
        store.replace_all(vec![comment(0, 4.0), comment(1, 1.0), comment(2, 2.0)], 2.0);
        assert_eq!(times(&store), [1.0, 2.0, 4.0]);
        assert_eq!(store.cursor(), 2);
    }

    #[test]
    fn seek_backs_up_one() {
        let mut store = CommentStore::new();
        store.replace_all(vec![comment(0, 1.0), comment(1, 2.0), comment(2, 3.0)], 0.0);
        assert_eq!(store.seek(2.0), 2);
        assert_eq!(store.cursor(), 1);
        assert_eq!(store.seek(0.0), 0);
        assert_eq!(store.cursor(), 0, "saturates at zero");
    }

    #[test]
    fn next_due_is_strict() {
        let mut store = CommentStore::new();
        store.replace_all(vec![comment(0, 1.0), comment(1, 2.0)], 0.0);
        assert!(store.next_due(1.0).is_none(), "time == now is not yet due");
        assert_eq!(store.next_due(1.5).map(|c| c.id), Some(CommentId(0)));
        store.advance();
        store.advance();
        store.advance();
        assert_eq!(store.cursor(), 2, "advance stops at the end");
        assert!(store.next_due(100.0).is_none());
    }

    #[test]
    fn backfill_range_is_closed() {
        let mut store = CommentStore::new();
        let all = [0.0, 2.0, 2.5, 5.0, 10.0, 10.5];
        store.replace_all(
            all.iter()
                .enumerate()
                .map(|(i, &t)| comment(i as u64, t))
                .collect(),
            0.0,
        );
        let r = store.backfill_range(2.0, 10.0);
        let picked: Vec<f64> = store.comments()[r].iter().map(|c| c.time).collect();
        assert_eq!(picked, [2.0, 2.5, 5.0, 10.0], "both ends included");

        let r = store.backfill_range(10.5, 10.5);
        assert_eq!(r, 5..6, "a single instant");
        let r = store.backfill_range(11.0, 20.0);
        assert!(r.is_empty(), "nothing in range");
    }

    mod random_order {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn any_insertion_order_stays_sorted_and_stable(
                halves in prop::collection::vec(0_u8..20, 0..64),
            ) {
                let mut store = CommentStore::new();
                for (i, &h) in halves.iter().enumerate() {
                    store.insert(comment(i as u64, f64::from(h) / 2.0));
                }
                prop_assert_eq!(store.len(), halves.len(), "nothing lost");
                for w in store.comments().windows(2) {
                    prop_assert!(
                        w[0].time < w[1].time || (w[0].time == w[1].time && w[0].id < w[1].id),
                        "{:?} at {} before {:?} at {}",
                        w[0].id,
                        w[0].time,
                        w[1].id,
                        w[1].time
                    );
                }
            }

            #[test]
            fn inserts_never_move_the_cursor_across_old_comments(
                halves in prop::collection::vec(0_u8..24, 0..64),
            ) {
                let admitted = 1_000..1_005;
                let pending = 1_005..1_010;
                let mut store = CommentStore::new();
                store.replace_all(
                    (0..10_u64).map(|i| comment(1_000 + i, i as f64)).collect(),
                    4.5,
                );
                prop_assert_eq!(store.cursor(), 5, "cursor at t=5");
                for (i, &h) in halves.iter().enumerate() {
                    store.insert(comment(i as u64, f64::from(h) / 2.0));
                    let (before, after) = store.comments().split_at(store.cursor());
                    prop_assert!(
                        before.iter().all(|c| !pending.contains(&c.id.0)),
                        "a pending comment fell behind the cursor"
                    );
                    prop_assert!(
                        after.iter().all(|c| !admitted.contains(&c.id.0)),
                        "an admitted comment came back"
                    );
                }
            }
        }
    }

    #[test]
    fn set_cursor_clamps() {
        let mut store = CommentStore::new();
        store.replace_all(vec![comment(0, 1.0)], 0.0);
        store.set_cursor(10);
        assert_eq!(store.cursor(), 1);
        store.clear();
        assert_eq!(store.cursor(), 0);
        assert!(store.is_empty());
    }
}
