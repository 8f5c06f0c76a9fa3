//! Human readable cache state, for operational debugging only

use filecache_storage::format_bytes;
use std::fmt;

use super::list::LruIndex;

/// One entry of the recency list as seen by [`Snapshot`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub name: String,
    pub size: u64,
    pub slot: usize,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

/// Point-in-time copy of the cache structure
///
/// The `Display` output is informal and may change between releases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub capacity: u64,
    pub total_size: u64,
    pub index_len: usize,
    /// Most recently used first
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub(crate) fn capture(list: &LruIndex) -> Self {
        Self {
            capacity: list.capacity(),
            total_size: list.total_size(),
            index_len: list.len(),
            entries: list
                .iter()
                .map(|(slot, entry)| SnapshotEntry {
                    name: entry.name.clone(),
                    size: entry.size,
                    slot,
                    prev: entry.prev,
                    next: entry.next,
                })
                .collect(),
        }
    }
}

fn link(slot: Option<usize>) -> String {
    slot.map_or_else(|| "-".to_string(), |s| s.to_string())
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "file cache: capacity {} ({}), cached {} ({}), {} indexed",
            self.capacity,
            format_bytes(self.capacity),
            self.total_size,
            format_bytes(self.total_size),
            self.index_len
        )?;
        if self.entries.is_empty() {
            return writeln!(f, "  (empty)");
        }
        for (pos, entry) in self.entries.iter().enumerate() {
            let role = match (pos, self.entries.len() - 1) {
                (0, 0) => "head/tail",
                (0, _) => "head",
                (p, last) if p == last => "tail",
                _ => "",
            };
            writeln!(
                f,
                "  {:>4} {:<9} {} size={} slot={} prev={} next={}",
                pos,
                role,
                entry.name,
                entry.size,
                entry.slot,
                link(entry.prev),
                link(entry.next)
            )?;
        }
        Ok(())
    }
}
