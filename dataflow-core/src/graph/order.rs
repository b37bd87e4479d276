//! Topological Order
//!
//! A totally ordered, doubly-linked list of active vertices in which every
//! dependency precedes its dependents.
//!
//! # Algorithm
//!
//! Entries live in a slab addressed by stable [`Position`]s, so a position
//! stays valid across unrelated insertions and removals. Each entry carries a
//! `u64` order label that increases along the list:
//!
//! 1. Inserting between two neighbours takes a label between theirs.
//! 2. When the neighbours have no free label between them, the smallest
//!    aligned label range around the insertion point that is sparse enough
//!    is relabelled evenly. A range of `2^i` labels counts as sparse while it
//!    holds fewer than `2^i / DENSITY^i` entries, so crowded spots spread
//!    into ever larger ranges and each insertion costs amortised O(log n)
//!    relabels instead of a pass over the whole list.
//! 3. `precedes(a, b)` is a single label comparison.
//!
//! Marked (dirty) entries are additionally indexed by label, which gives the
//! pump its cursor: the earliest marked entry is always the next one to
//! visit, including entries marked after the traversal started.

use std::collections::BTreeMap;

use super::vertex::VertexId;

/// Label distance used when appending at the tail.
const SPACING: u128 = 1 << 32;

/// Size of the label space.
const LABELS: u128 = 1 << 64;

/// Growth factor of the density bound between nested relabelling ranges.
const DENSITY: f64 = 1.5;

/// A stable slot in the topological order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position(u32);

impl Position {
    fn slot(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct Entry {
    vertex: VertexId,
    label: u64,
    prev: Option<Position>,
    next: Option<Position>,
    marked: bool,
    live: bool,
}

/// The topological order over active vertices.
#[derive(Debug, Default)]
pub struct TopologicalOrder {
    entries: Vec<Entry>,
    free: Vec<Position>,
    head: Option<Position>,
    tail: Option<Position>,
    len: usize,
    marked: BTreeMap<u64, Position>,
}

impl TopologicalOrder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    /// Number of entries in the order.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The earliest entry.
    pub fn front(&self) -> Option<Position> {
        self.head
    }

    /// The vertex stored at `position`.
    pub fn vertex(&self, position: Position) -> VertexId {
        self.entry(position).vertex
    }

    /// Append `vertex` after every existing entry.
    pub fn push_back(&mut self, vertex: VertexId) -> Position {
        let tail = self.tail;
        let label = self.free_label(tail, None, |lo, hi| lo + SPACING.min((hi - lo) / 2));

        let position = self.allocate(vertex, label);
        self.link(position, tail, None);
        position
    }

    /// Insert `vertex` immediately before `anchor`.
    pub fn insert_before(&mut self, anchor: Position, vertex: VertexId) -> Position {
        let prev = self.entry(anchor).prev;
        let label = self.free_label(prev, Some(anchor), |lo, hi| lo + (hi - lo) / 2);

        let position = self.allocate(vertex, label);
        self.link(position, prev, Some(anchor));
        position
    }

    /// Remove the entry at `position`. The position must be live.
    pub fn erase(&mut self, position: Position) {
        let entry = self.entry(position);
        let (prev, next, label, marked) = (entry.prev, entry.next, entry.label, entry.marked);

        if marked {
            self.marked.remove(&label);
        }

        match prev {
            Some(prev) => self.entries[prev.slot()].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.entries[next.slot()].prev = prev,
            None => self.tail = prev,
        }

        let entry = &mut self.entries[position.slot()];
        entry.live = false;
        entry.marked = false;
        entry.prev = None;
        entry.next = None;

        self.free.push(position);
        self.len -= 1;
    }

    /// Does `a` strictly precede `b`?
    pub fn precedes(&self, a: Position, b: Position) -> bool {
        self.entry(a).label < self.entry(b).label
    }

    pub fn mark(&mut self, position: Position) {
        let entry = &mut self.entries[position.slot()];
        assert!(entry.live, "marking an erased position");
        if !entry.marked {
            entry.marked = true;
            self.marked.insert(entry.label, position);
        }
    }

    pub fn unmark(&mut self, position: Position) {
        let entry = &mut self.entries[position.slot()];
        assert!(entry.live, "unmarking an erased position");
        if entry.marked {
            entry.marked = false;
            self.marked.remove(&entry.label);
        }
    }

    pub fn is_marked(&self, position: Position) -> bool {
        self.entry(position).marked
    }

    /// The earliest marked entry, re-evaluated on every call so that marks
    /// added during a traversal are picked up in order.
    pub fn first_marked(&self) -> Option<Position> {
        self.marked.first_key_value().map(|(_, position)| *position)
    }

    /// Marked entries in order.
    pub fn marked(&self) -> impl Iterator<Item = Position> + '_ {
        self.marked.values().copied()
    }

    pub fn clear_marks(&mut self) {
        for (_, position) in std::mem::take(&mut self.marked) {
            self.entries[position.slot()].marked = false;
        }
    }

    /// Entries from front to back.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            order: self,
            next: self.head,
        }
    }

    fn entry(&self, position: Position) -> &Entry {
        let entry = &self.entries[position.slot()];
        assert!(entry.live, "access to an erased position");
        entry
    }

    /// A label strictly between `prev` and `next`, picked by `pick` from
    /// the open gap. Relabels around the neighbours when the gap is closed.
    fn free_label(
        &mut self,
        prev: Option<Position>,
        next: Option<Position>,
        pick: impl Fn(u128, u128) -> u128,
    ) -> u64 {
        let gap = |order: &Self| {
            let lo = prev.map_or(0, |p| u128::from(order.entry(p).label));
            let hi = next.map_or(LABELS, |n| u128::from(order.entry(n).label));
            (lo, hi)
        };

        let (mut lo, mut hi) = gap(self);
        if hi - lo < 2 {
            if let Some(around) = next.or(prev) {
                self.relabel_around(around);
            }
            (lo, hi) = gap(self);
        }
        assert!(hi - lo >= 2, "topological order has no free label");

        let label = pick(lo, hi);
        debug_assert!(lo < label && label < hi);
        label as u64
    }

    fn allocate(&mut self, vertex: VertexId, label: u64) -> Position {
        let entry = Entry {
            vertex,
            label,
            prev: None,
            next: None,
            marked: false,
            live: true,
        };

        self.len += 1;

        match self.free.pop() {
            Some(position) => {
                self.entries[position.slot()] = entry;
                position
            }
            None => {
                self.entries.push(entry);
                Position((self.entries.len() - 1) as u32)
            }
        }
    }

    fn link(&mut self, position: Position, prev: Option<Position>, next: Option<Position>) {
        {
            let entry = &mut self.entries[position.slot()];
            entry.prev = prev;
            entry.next = next;
        }
        match prev {
            Some(prev) => self.entries[prev.slot()].next = Some(position),
            None => self.head = Some(position),
        }
        match next {
            Some(next) => self.entries[next.slot()].prev = Some(position),
            None => self.tail = Some(position),
        }
    }

    /// Spread the labels of the smallest sparse enough aligned range
    /// containing `around` evenly over that range.
    fn relabel_around(&mut self, around: Position) {
        let label = u128::from(self.entry(around).label);
        let (mut first, mut last) = (around, around);
        let mut count: u128 = 1;

        for bits in 1..=64u32 {
            let size = 1u128 << bits;
            let base = label & !(size - 1);
            let end = base + size;

            // The ranges are nested, so the walk only ever extends outwards.
            while let Some(prev) = self.entry(first).prev {
                if u128::from(self.entry(prev).label) < base {
                    break;
                }
                first = prev;
                count += 1;
            }
            while let Some(next) = self.entry(last).next {
                if u128::from(self.entry(next).label) >= end {
                    break;
                }
                last = next;
                count += 1;
            }

            let sparse = (count + 1) as f64 * DENSITY.powi(bits as i32) < size as f64;
            if sparse && size >= 2 * (count + 1) {
                self.spread(first, count, base, size / (count + 1));
                return;
            }
        }

        panic!("topological order is full");
    }

    /// Relabel `count` entries starting at `first` to `base + step`,
    /// `base + 2 * step`, and so on, keeping the marked index in sync.
    fn spread(&mut self, first: Position, count: u128, base: u128, step: u128) {
        let mut relabelled = Vec::with_capacity(count as usize);
        let mut cursor = Some(first);
        for _ in 0..count {
            let Some(position) = cursor else { break };
            let entry = &self.entries[position.slot()];
            if entry.marked {
                self.marked.remove(&entry.label);
            }
            relabelled.push(position);
            cursor = entry.next;
        }

        let mut label = base;
        for position in relabelled {
            label += step;
            let entry = &mut self.entries[position.slot()];
            entry.label = label as u64;
            if entry.marked {
                self.marked.insert(entry.label, position);
            }
        }
    }
}

/// Iterator over `(position, vertex)` pairs in topological order.
pub struct Iter<'a> {
    order: &'a TopologicalOrder,
    next: Option<Position>,
}

impl Iterator for Iter<'_> {
    type Item = (Position, VertexId);

    fn next(&mut self) -> Option<Self::Item> {
        let position = self.next?;
        let entry = self.order.entry(position);
        self.next = entry.next;
        Some((position, entry.vertex))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(index: u32) -> VertexId {
        VertexId::new(index, 0)
    }

    fn vertices(order: &TopologicalOrder) -> Vec<u32> {
        order.iter().map(|(_, vertex)| vertex.index()).collect()
    }

    #[test]
    fn push_back_and_insert_before() {
        let mut order = TopologicalOrder::new();
        let a = order.push_back(v(0));
        let c = order.push_back(v(2));
        let b = order.insert_before(c, v(1));
        let z = order.insert_before(a, v(9));

        assert_eq!(vertices(&order), vec![9, 0, 1, 2]);
        assert!(order.precedes(z, a));
        assert!(order.precedes(a, b));
        assert!(order.precedes(b, c));
        assert!(!order.precedes(c, b));
        assert_eq!(order.front(), Some(z));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn erase_relinks_neighbours() {
        let mut order = TopologicalOrder::new();
        let a = order.push_back(v(0));
        let b = order.push_back(v(1));
        let c = order.push_back(v(2));

        order.erase(b);
        assert_eq!(vertices(&order), vec![0, 2]);

        order.erase(a);
        assert_eq!(order.front(), Some(c));

        order.erase(c);
        assert!(order.is_empty());
        assert_eq!(order.front(), None);
    }

    #[test]
    fn erased_slots_are_reused() {
        let mut order = TopologicalOrder::new();
        let a = order.push_back(v(0));
        let b = order.push_back(v(1));
        order.erase(a);

        let c = order.insert_before(b, v(2));
        assert_eq!(c, a);
        assert_eq!(vertices(&order), vec![2, 1]);
    }

    #[test]
    fn repeated_insertion_at_one_spot_relabels() {
        let mut order = TopologicalOrder::new();
        let last = order.push_back(v(0));

        // Every insertion halves the gap before `last`, so this forces
        // several relabelling passes.
        for index in 1..200 {
            order.insert_before(last, v(index));
        }

        let labels: Vec<u64> = order.iter().map(|(p, _)| order.entry(p).label).collect();
        assert!(labels.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(order.len(), 200);
        assert_eq!(vertices(&order).last(), Some(&0));
        assert_eq!(vertices(&order)[0], 1);
    }

    #[test]
    fn relabelling_stays_local() {
        let mut order = TopologicalOrder::new();
        let positions: Vec<Position> = (0..100).map(|index| order.push_back(v(index))).collect();
        let (first, middle, last) = (positions[0], positions[50], positions[99]);
        let (first_label, last_label) = (order.entry(first).label, order.entry(last).label);

        order.mark(middle);
        order.mark(last);
        for index in 100..5_100 {
            let inserted = order.insert_before(middle, v(index));
            if index % 7 == 0 {
                order.mark(inserted);
            }
        }

        // Entries far from the crowded spot keep their labels.
        assert_eq!(order.entry(first).label, first_label);
        assert_eq!(order.entry(last).label, last_label);

        let labels: Vec<u64> = order.iter().map(|(p, _)| order.entry(p).label).collect();
        assert!(labels.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(order.len(), 5_100);

        // The marked index follows the relabelled entries.
        let marked: Vec<Position> = order.marked().collect();
        assert_eq!(marked.len(), (100..5_100).filter(|i| i % 7 == 0).count() + 2);
        assert!(marked.iter().all(|&p| order.is_marked(p)));
        let marked_labels: Vec<u64> = marked.iter().map(|&p| order.entry(p).label).collect();
        assert!(marked_labels.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(marked.last(), Some(&last));
    }

    #[test]
    fn marked_cursor_visits_in_order() {
        let mut order = TopologicalOrder::new();
        let a = order.push_back(v(0));
        let b = order.push_back(v(1));
        let c = order.push_back(v(2));

        order.mark(c);
        order.mark(a);
        assert_eq!(order.first_marked(), Some(a));

        order.unmark(a);
        assert_eq!(order.first_marked(), Some(c));

        // A mark ahead of the cursor is visited before the later one.
        order.mark(b);
        assert_eq!(order.first_marked(), Some(b));
        assert_eq!(order.marked().collect::<Vec<_>>(), vec![b, c]);
    }

    #[test]
    fn marks_survive_relabelling() {
        let mut order = TopologicalOrder::new();
        let last = order.push_back(v(0));
        order.mark(last);

        let mut first = last;
        for index in 1..100 {
            first = order.insert_before(last, v(index));
        }
        order.mark(first);

        assert_eq!(order.marked().collect::<Vec<_>>(), vec![first, last]);
        assert!(order.is_marked(last));
    }

    #[test]
    fn erase_and_clear_drop_marks() {
        let mut order = TopologicalOrder::new();
        let a = order.push_back(v(0));
        let b = order.push_back(v(1));
        order.mark(a);
        order.mark(b);

        order.erase(a);
        assert_eq!(order.first_marked(), Some(b));

        order.clear_marks();
        assert_eq!(order.first_marked(), None);
        assert!(!order.is_marked(b));
    }
}
