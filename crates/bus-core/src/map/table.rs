//! Priority-ordered range tables, one per access width tier and direction.

use crate::map::entry::HandlerEntry;
use crate::width::{WIDTH_TIERS, WIDTH_TIER_COUNT};

/// Installed handler entries for one direction and width tier, kept in
/// install order. Later installs shadow earlier overlapping ones, so exact
/// lookup scans in reverse.
#[derive(Debug, Default, Clone)]
pub struct RangeTable {
    entries: Vec<HandlerEntry>,
}

impl RangeTable {
    /// Number of installed entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing was installed at this tier.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in install order, lowest priority first.
    #[must_use]
    pub fn entries(&self) -> &[HandlerEntry] {
        &self.entries
    }

    pub(crate) fn push(&mut self, entry: HandlerEntry) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub(crate) fn lookup(&self, addr: u64) -> Option<&HandlerEntry> {
        self.entries.iter().rev().find(|entry| entry.matches(addr))
    }
}

/// The per-direction map: one [`RangeTable`] per width tier.
///
/// Entries at different tiers can overlap; the winner for an address is the
/// matching entry with the highest install sequence number across all tiers.
#[derive(Debug, Default, Clone)]
pub struct DirectionMap {
    tiers: [RangeTable; WIDTH_TIER_COUNT],
}

impl DirectionMap {
    pub fn install(&mut self, entry: HandlerEntry) -> (usize, usize) {
        let tier = entry.width().tier();
        let index = self.tiers[tier].push(entry);
        (tier, index)
    }

    pub fn entry_at(&self, tier: usize, index: usize) -> &HandlerEntry {
        &self.tiers[tier].entries()[index]
    }

    /// Exact-match fallback: the latest-installed matching entry across all
    /// width tiers.
    pub fn scan(&self, addr: u64) -> Option<&HandlerEntry> {
        self.tiers
            .iter()
            .filter_map(|table| table.lookup(addr))
            .max_by_key(|entry| entry.seq)
    }

    /// All entries with their tier and in-tier index, ordered by install
    /// sequence (lowest priority first).
    pub fn entries_by_seq(&self) -> Vec<(usize, usize, &HandlerEntry)> {
        let mut entries: Vec<(usize, usize, &HandlerEntry)> = WIDTH_TIERS
            .iter()
            .flat_map(|width| {
                let tier = width.tier();
                self.tiers[tier]
                    .entries()
                    .iter()
                    .enumerate()
                    .map(move |(index, entry)| (tier, index, entry))
            })
            .collect();
        entries.sort_by_key(|(_, _, entry)| entry.seq);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::DirectionMap;
    use crate::map::entry::{HandlerEntry, Target};
    use crate::width::AccessWidth;

    fn entry(start: u64, end: u64, width: AccessWidth, seq: u64) -> HandlerEntry {
        HandlerEntry {
            start,
            end,
            width,
            mirror: 0,
            seq,
            target: Target::Hole,
        }
    }

    #[test]
    fn later_installs_shadow_earlier_overlapping_ones() {
        let mut map = DirectionMap::default();
        map.install(entry(0x0000, 0xFFFF, AccessWidth::Byte, 0));
        map.install(entry(0x4000, 0x7FFF, AccessWidth::Byte, 1));

        assert_eq!(map.scan(0x4000).map(|e| e.seq), Some(1));
        assert_eq!(map.scan(0x3FFF).map(|e| e.seq), Some(0));
        assert_eq!(map.scan(0x8000).map(|e| e.seq), Some(0));
    }

    #[test]
    fn priority_crosses_width_tiers() {
        let mut map = DirectionMap::default();
        map.install(entry(0x0000, 0x0FFF, AccessWidth::Word, 0));
        map.install(entry(0x0100, 0x01FF, AccessWidth::Byte, 1));

        assert_eq!(map.scan(0x0100).map(|e| e.seq), Some(1));
        assert_eq!(map.scan(0x0200).map(|e| e.seq), Some(0));
    }

    #[test]
    fn scan_misses_outside_every_range() {
        let mut map = DirectionMap::default();
        map.install(entry(0x1000, 0x1FFF, AccessWidth::Byte, 0));
        assert!(map.scan(0x2000).is_none());
    }

    #[test]
    fn entries_by_seq_orders_across_tiers() {
        let mut map = DirectionMap::default();
        map.install(entry(0x0, 0xFF, AccessWidth::Word, 0));
        map.install(entry(0x0, 0xFF, AccessWidth::Byte, 1));
        map.install(entry(0x0, 0xFF, AccessWidth::Dword, 2));

        let seqs: Vec<u64> = map
            .entries_by_seq()
            .into_iter()
            .map(|(_, _, entry)| entry.seq)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2]);
    }
}
