//! Index and recency list
//!
//! Entries live in a slab of slots addressed by `usize` indices. `prev` and
//! `next` are slot indices, so relinking an entry is O(1) and no entry can be
//! reached through a dangling link. The index maps each cached name to its
//! slot; both structures always hold exactly the same set of entries.

use bytes::Bytes;
use std::collections::HashMap;
use std::mem;

/// One cached file
#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) name: String,
    pub(crate) size: u64,
    pub(crate) content: Bytes,
    pub(crate) prev: Option<usize>,
    pub(crate) next: Option<usize>,
}

#[derive(Debug)]
enum Slot {
    Occupied(Entry),
    Vacant,
}

/// Ends of the recency list. Both ends exist or neither does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ends {
    Empty,
    Linked { head: usize, tail: usize },
}

/// An entry removed from the tail to make room
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Evicted {
    pub(crate) name: String,
    pub(crate) size: u64,
}

/// Outcome of offering freshly fetched content to the cache
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Admission {
    /// The content is now the head entry
    Cached {
        evicted: Vec<Evicted>,
        /// Size of an older entry for the same name that was replaced
        superseded: Option<u64>,
    },
    /// Larger than the whole capacity; returned to the caller uncached
    PassThrough,
}

pub(crate) struct LruIndex {
    index: HashMap<String, usize>,
    slots: Vec<Slot>,
    free: Vec<usize>,
    ends: Ends,
    total_size: u64,
    capacity: u64,
}

impl LruIndex {
    pub(crate) fn new(capacity: u64) -> Self {
        Self {
            index: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            ends: Ends::Empty,
            total_size: 0,
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> u64 {
        self.capacity
    }

    pub(crate) fn total_size(&self) -> u64 {
        self.total_size
    }

    pub(crate) fn len(&self) -> usize {
        self.index.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ends == Ends::Empty
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Look up `name`, promoting it to most recently used on a hit
    pub(crate) fn get(&mut self, name: &str) -> Option<Bytes> {
        let idx = *self.index.get(name)?;
        self.promote(idx);
        Some(self.node(idx).content.clone())
    }

    /// Insert fetched content at the head, evicting from the tail only as far
    /// as needed to fit it
    pub(crate) fn insert(&mut self, name: &str, content: Bytes) -> Admission {
        let size = content.len() as u64;
        if size > self.capacity {
            return Admission::PassThrough;
        }

        // A concurrent miss for the same name got here first
        let superseded = self.index.remove(name).map(|idx| {
            self.unlink(idx);
            let old = self.release(idx);
            self.total_size -= old.size;
            old.size
        });

        let mut evicted = Vec::new();
        while self.capacity - self.total_size < size {
            match self.pop_tail() {
                Some(entry) => evicted.push(Evicted {
                    name: entry.name,
                    size: entry.size,
                }),
                None => break,
            }
        }

        let idx = self.allocate(Entry {
            name: name.to_string(),
            size,
            content,
            prev: None,
            next: None,
        });
        self.push_front(idx);
        self.index.insert(name.to_string(), idx);
        self.total_size += size;

        Admission::Cached {
            evicted,
            superseded,
        }
    }

    /// Cached names from most to least recently used
    pub(crate) fn keys(&self) -> Vec<String> {
        self.iter().map(|(_, e)| e.name.clone()).collect()
    }

    /// Walk the list from head to tail, yielding each entry with its slot
    pub(crate) fn iter(&self) -> Iter<'_> {
        let cursor = match self.ends {
            Ends::Empty => None,
            Ends::Linked { head, .. } => Some(head),
        };
        Iter { list: self, cursor }
    }

    fn promote(&mut self, idx: usize) {
        if let Ends::Linked { head, .. } = self.ends
            && head == idx
        {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn pop_tail(&mut self) -> Option<Entry> {
        let Ends::Linked { tail, .. } = self.ends else {
            return None;
        };
        self.unlink(tail);
        let entry = self.release(tail);
        self.index.remove(&entry.name);
        self.total_size -= entry.size;
        Some(entry)
    }

    /// Detach a linked entry, reconnecting its neighbours and the list ends
    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node_mut(idx);
            (node.prev.take(), node.next.take())
        };

        if let Some(p) = prev {
            self.node_mut(p).next = next;
        }
        if let Some(n) = next {
            self.node_mut(n).prev = prev;
        }

        self.ends = match self.ends {
            Ends::Empty => unreachable!("unlinking slot {idx} from an empty list"),
            Ends::Linked { head, tail } => {
                let head = if prev.is_none() { next } else { Some(head) };
                let tail = if next.is_none() { prev } else { Some(tail) };
                match (head, tail) {
                    (Some(head), Some(tail)) => Ends::Linked { head, tail },
                    _ => Ends::Empty,
                }
            }
        };
    }

    fn push_front(&mut self, idx: usize) {
        match self.ends {
            Ends::Empty => {
                let node = self.node_mut(idx);
                node.prev = None;
                node.next = None;
                self.ends = Ends::Linked {
                    head: idx,
                    tail: idx,
                };
            }
            Ends::Linked { head, tail } => {
                self.node_mut(head).prev = Some(idx);
                let node = self.node_mut(idx);
                node.prev = None;
                node.next = Some(head);
                self.ends = Ends::Linked { head: idx, tail };
            }
        }
    }

    fn allocate(&mut self, entry: Entry) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Slot::Occupied(entry);
                idx
            }
            None => {
                self.slots.push(Slot::Occupied(entry));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> Entry {
        match mem::replace(&mut self.slots[idx], Slot::Vacant) {
            Slot::Occupied(entry) => {
                self.free.push(idx);
                entry
            }
            Slot::Vacant => unreachable!("releasing vacant slot {idx}"),
        }
    }

    fn node(&self, idx: usize) -> &Entry {
        match &self.slots[idx] {
            Slot::Occupied(entry) => entry,
            Slot::Vacant => unreachable!("slot {idx} is linked but vacant"),
        }
    }

    fn node_mut(&mut self, idx: usize) -> &mut Entry {
        match &mut self.slots[idx] {
            Slot::Occupied(entry) => entry,
            Slot::Vacant => unreachable!("slot {idx} is linked but vacant"),
        }
    }

    /// Panics unless size accounting, index/list agreement and link symmetry
    /// all hold
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) {
        use std::collections::HashSet;

        let mut seen = HashSet::new();
        let mut sum = 0u64;
        let mut prev: Option<usize> = None;
        let mut last = None;
        let mut cursor = match self.ends {
            Ends::Empty => None,
            Ends::Linked { head, .. } => Some(head),
        };

        while let Some(idx) = cursor {
            let node = self.node(idx);
            assert!(seen.insert(idx), "slot {idx} appears twice in the list");
            assert_eq!(node.prev, prev, "broken back link at slot {idx}");
            assert_eq!(node.size, node.content.len() as u64);
            assert!(node.size <= self.capacity);
            assert_eq!(self.index.get(&node.name), Some(&idx));
            sum += node.size;
            prev = Some(idx);
            last = Some(idx);
            cursor = node.next;
        }

        match self.ends {
            Ends::Empty => {
                assert!(self.index.is_empty());
                assert_eq!(self.total_size, 0);
            }
            Ends::Linked { tail, .. } => assert_eq!(last, Some(tail)),
        }
        assert_eq!(seen.len(), self.index.len());
        assert_eq!(sum, self.total_size);
        assert!(self.total_size <= self.capacity);

        let occupied = self
            .slots
            .iter()
            .filter(|s| matches!(s, Slot::Occupied(_)))
            .count();
        assert_eq!(occupied + self.free.len(), self.slots.len());
        assert_eq!(occupied, self.index.len());
    }
}

/// Head-to-tail iterator over linked entries
pub(crate) struct Iter<'a> {
    list: &'a LruIndex,
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (usize, &'a Entry);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.cursor?;
        let entry = self.list.node(idx);
        self.cursor = entry.next;
        Some((idx, entry))
    }
}
