#![cfg_attr(not(test), no_std)]

pub mod lifecycle;
pub mod media;
pub mod name;
pub mod nav;
pub mod scan;
pub mod session;
pub mod sort;

#[cfg(test)]
pub(crate) mod fixtures;

pub use lifecycle::{service_media, MediaActions, MediaLifecycle};
pub use media::{CardError, MediaPort, PortError, RawDirRecord};
pub use session::{CardHooks, CardSession, JobOutcome, SortConfig};
pub use sort::{FolderSorting, SortTier};

/// Capacity of a decoded 8.3 name ("XXXXXXXX.YYY", no terminator).
pub const SHORT_NAME_MAX: usize = 12;
/// Capacity of a long display name; longer names are clamped with a marker.
pub const LONG_NAME_MAX: usize = 26;
/// Deepest directory prefix remembered by the cwd stack. Deeper paths still
/// resolve, only the remembered prefix degrades.
pub const MAX_DIR_DEPTH: usize = 10;
/// Room for "/" + MAX_DIR_DEPTH short names with separators + a file name.
pub const PATH_MAX: usize = 1 + MAX_DIR_DEPTH * (SHORT_NAME_MAX + 1) + SHORT_NAME_MAX;
/// Most entries a sorted listing can hold; the rest stay reachable by raw index.
pub const SORT_LIMIT: usize = 20;
/// Nested procedure-file frames a job may hold before overflow is fatal.
pub const PROCEDURE_DEPTH: usize = 5;

pub type ShortName = heapless::String<SHORT_NAME_MAX>;
pub type LongName = heapless::String<LONG_NAME_MAX>;
pub type PathBuf = heapless::String<PATH_MAX>;
