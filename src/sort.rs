use core::array;
use core::cmp::Ordering;

use crate::media::{CardError, MediaPort, PortError};
use crate::name::name_cmp;
use crate::scan::{self, EntryInfo};
use crate::{LongName, ShortName, SORT_LIMIT};

const DIR_BITMAP_BYTES: usize = (SORT_LIMIT + 7) / 8;

/// Where folders land relative to files; applied before name comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FolderSorting {
    None,
    First,
    Last,
}

/// RAM tier for the listing sort, chosen by configuration at build time of
/// the firmware image. All tiers produce the same order for directories
/// whose visible names are pairwise distinct ignoring case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortTier {
    /// Display names and flags are read once up front; comparisons are
    /// memory reads, and the cache also serves post-sort selection.
    FullCache,
    /// Only the 8.3 name and two bitmaps per entry; long display names are
    /// re-read from the volume for each comparison.
    ShortNameCache,
    /// Nothing cached beyond one name buffer; minimal RAM, maximal I/O.
    Minimal,
}

/// Permutation of raw visible-entry indices in sorted order.
pub type SortIndex = heapless::Vec<u8, SORT_LIMIT>;

pub trait SortStrategy<P: MediaPort> {
    fn presort(
        &mut self,
        port: &mut P,
        dir: &mut P::Dir,
        visible: u16,
        folders: FolderSorting,
    ) -> Result<SortIndex, CardError>;
}

fn clamped_count(visible: u16) -> usize {
    let count = visible as usize;
    if count > SORT_LIMIT {
        // Over-budget entries are omitted from the sorted view but stay
        // reachable by raw index.
        log::debug!("card: sort_clamped visible={} limit={}", visible, SORT_LIMIT);
        return SORT_LIMIT;
    }
    count
}

fn identity_order(count: usize) -> SortIndex {
    let mut order = SortIndex::new();
    for i in 0..count {
        let _ = order.push(i as u8);
    }
    order
}

/// Pairwise-exchange sort shared by every tier, with early exit once a full
/// pass swaps nothing. O(k²) is fine: k never exceeds SORT_LIMIT.
fn exchange_sort<F>(order: &mut SortIndex, mut out_of_order: F) -> Result<(), CardError>
where
    F: FnMut(u8, u8) -> Result<bool, CardError>,
{
    let count = order.len();
    if count < 2 {
        return Ok(());
    }
    for pass_end in (1..count).rev() {
        let mut swapped = false;
        for j in 0..pass_end {
            if out_of_order(order[j], order[j + 1])? {
                order.swap(j, j + 1);
                swapped = true;
            }
        }
        if !swapped {
            break;
        }
    }
    Ok(())
}

fn pair_out_of_order(
    folders: FolderSorting,
    left_is_dir: bool,
    right_is_dir: bool,
    left: &str,
    right: &str,
) -> bool {
    if left_is_dir != right_is_dir {
        return match folders {
            FolderSorting::None => name_cmp(left, right) == Ordering::Greater,
            FolderSorting::First => right_is_dir,
            FolderSorting::Last => left_is_dir,
        };
    }
    name_cmp(left, right) == Ordering::Greater
}

/// An entry vanished between the count pass and the sort pass; the medium
/// is lying to us, surface it as an I/O fault.
fn reread_entry<P: MediaPort>(
    port: &mut P,
    dir: &mut P::Dir,
    raw: u8,
) -> Result<EntryInfo, CardError> {
    scan::entry_at(port, dir, raw as u16)?.ok_or(CardError::Port(PortError::Io))
}

fn bit_get(bits: &[u8; DIR_BITMAP_BYTES], i: u8) -> bool {
    (bits[(i >> 3) as usize] & (1 << (i & 0x07))) != 0
}

fn bit_set(bits: &mut [u8; DIR_BITMAP_BYTES], i: u8) {
    bits[(i >> 3) as usize] |= 1 << (i & 0x07);
}

pub struct FullCacheSort {
    count: u8,
    shorts: [ShortName; SORT_LIMIT],
    names: [LongName; SORT_LIMIT],
    dir_bits: [u8; DIR_BITMAP_BYTES],
}

impl FullCacheSort {
    pub fn new() -> Self {
        Self {
            count: 0,
            shorts: array::from_fn(|_| ShortName::new()),
            names: array::from_fn(|_| LongName::new()),
            dir_bits: [0; DIR_BITMAP_BYTES],
        }
    }

    /// Cached `(short, display, is_dir)` for a raw index, valid since the
    /// last presort. Lets selection skip the medium entirely.
    pub fn cached(&self, raw: u8) -> Option<(&str, &str, bool)> {
        if raw >= self.count {
            return None;
        }
        let i = raw as usize;
        Some((
            self.shorts[i].as_str(),
            self.names[i].as_str(),
            bit_get(&self.dir_bits, raw),
        ))
    }
}

impl Default for FullCacheSort {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: MediaPort> SortStrategy<P> for FullCacheSort {
    fn presort(
        &mut self,
        port: &mut P,
        dir: &mut P::Dir,
        visible: u16,
        folders: FolderSorting,
    ) -> Result<SortIndex, CardError> {
        let count = clamped_count(visible);
        self.count = 0;
        self.dir_bits = [0; DIR_BITMAP_BYTES];
        for i in 0..count {
            let entry = reread_entry(port, dir, i as u8)?;
            self.shorts[i].clear();
            let _ = self.shorts[i].push_str(entry.short.as_str());
            self.names[i].clear();
            let _ = self.names[i].push_str(entry.display());
            if entry.is_dir() {
                bit_set(&mut self.dir_bits, i as u8);
            }
        }
        self.count = count as u8;

        let mut order = identity_order(count);
        exchange_sort(&mut order, |a, b| {
            Ok(pair_out_of_order(
                folders,
                bit_get(&self.dir_bits, a),
                bit_get(&self.dir_bits, b),
                self.names[a as usize].as_str(),
                self.names[b as usize].as_str(),
            ))
        })?;
        Ok(order)
    }
}

pub struct ShortNameCacheSort {
    shorts: [ShortName; SORT_LIMIT],
    dir_bits: [u8; DIR_BITMAP_BYTES],
    long_bits: [u8; DIR_BITMAP_BYTES],
}

impl ShortNameCacheSort {
    pub fn new() -> Self {
        Self {
            shorts: array::from_fn(|_| ShortName::new()),
            dir_bits: [0; DIR_BITMAP_BYTES],
            long_bits: [0; DIR_BITMAP_BYTES],
        }
    }
}

impl Default for ShortNameCacheSort {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: MediaPort> SortStrategy<P> for ShortNameCacheSort {
    fn presort(
        &mut self,
        port: &mut P,
        dir: &mut P::Dir,
        visible: u16,
        folders: FolderSorting,
    ) -> Result<SortIndex, CardError> {
        let count = clamped_count(visible);
        self.dir_bits = [0; DIR_BITMAP_BYTES];
        self.long_bits = [0; DIR_BITMAP_BYTES];
        for i in 0..count {
            let entry = reread_entry(port, dir, i as u8)?;
            self.shorts[i].clear();
            let _ = self.shorts[i].push_str(entry.short.as_str());
            if entry.is_dir() {
                bit_set(&mut self.dir_bits, i as u8);
            }
            if !entry.long.is_empty() {
                bit_set(&mut self.long_bits, i as u8);
            }
        }

        let mut order = identity_order(count);
        let mut left_name = LongName::new();
        exchange_sort(&mut order, |a, b| {
            // Entries displayed by their 8.3 name compare straight from the
            // cache; only long-named entries go back to the medium.
            left_name.clear();
            if bit_get(&self.long_bits, a) {
                let left = reread_entry(port, dir, a)?;
                let _ = left_name.push_str(left.display());
            } else {
                let _ = left_name.push_str(self.shorts[a as usize].as_str());
            }
            let left_is_dir = bit_get(&self.dir_bits, a);
            let right_is_dir = bit_get(&self.dir_bits, b);
            if bit_get(&self.long_bits, b) {
                let right = reread_entry(port, dir, b)?;
                Ok(pair_out_of_order(
                    folders,
                    left_is_dir,
                    right_is_dir,
                    left_name.as_str(),
                    right.display(),
                ))
            } else {
                Ok(pair_out_of_order(
                    folders,
                    left_is_dir,
                    right_is_dir,
                    left_name.as_str(),
                    self.shorts[b as usize].as_str(),
                ))
            }
        })?;
        Ok(order)
    }
}

/// No cache at all: both compared entries are re-read from the volume for
/// every comparison.
pub struct MinimalSort;

impl<P: MediaPort> SortStrategy<P> for MinimalSort {
    fn presort(
        &mut self,
        port: &mut P,
        dir: &mut P::Dir,
        visible: u16,
        folders: FolderSorting,
    ) -> Result<SortIndex, CardError> {
        let count = clamped_count(visible);
        let mut order = identity_order(count);
        let mut left_name = LongName::new();
        exchange_sort(&mut order, |a, b| {
            let left = reread_entry(port, dir, a)?;
            left_name.clear();
            let _ = left_name.push_str(left.display());
            let left_is_dir = left.is_dir();
            let right = reread_entry(port, dir, b)?;
            Ok(pair_out_of_order(
                folders,
                left_is_dir,
                right.is_dir(),
                left_name.as_str(),
                right.display(),
            ))
        })?;
        Ok(order)
    }
}

/// Tier-selected sorter with static dispatch.
pub enum DirSorter {
    Full(FullCacheSort),
    ShortNames(ShortNameCacheSort),
    Minimal(MinimalSort),
}

impl DirSorter {
    pub fn new(tier: SortTier) -> Self {
        match tier {
            SortTier::FullCache => Self::Full(FullCacheSort::new()),
            SortTier::ShortNameCache => Self::ShortNames(ShortNameCacheSort::new()),
            SortTier::Minimal => Self::Minimal(MinimalSort),
        }
    }

    pub fn presort<P: MediaPort>(
        &mut self,
        port: &mut P,
        dir: &mut P::Dir,
        visible: u16,
        folders: FolderSorting,
    ) -> Result<SortIndex, CardError> {
        match self {
            Self::Full(tier) => tier.presort(port, dir, visible, folders),
            Self::ShortNames(tier) => tier.presort(port, dir, visible, folders),
            Self::Minimal(tier) => tier.presort(port, dir, visible, folders),
        }
    }

    /// Full-cache fast path for selection; other tiers go back to the medium.
    pub fn cached(&self, raw: u8) -> Option<(&str, &str, bool)> {
        match self {
            Self::Full(tier) => tier.cached(raw),
            _ => None,
        }
    }
}
