use crate::{LongName, ShortName};

pub const ATTR_DIRECTORY: u8 = 0x10;
pub const ATTR_HIDDEN: u8 = 0x02;
pub const ATTR_VOLUME: u8 = 0x08;
pub const NAME_FREE: u8 = 0x00;
pub const NAME_DELETED: u8 = 0xE5;

/// One raw fixed-width directory record as it sits on the medium.
///
/// `loc` is an opaque backing-storage pointer; only the port interprets it.
#[derive(Clone, Copy, Debug)]
pub struct RawDirRecord {
    pub name: [u8; 11],
    pub attr: u8,
    pub size: u32,
    pub loc: u32,
}

impl RawDirRecord {
    pub fn is_dir(&self) -> bool {
        (self.attr & ATTR_DIRECTORY) != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PortError {
    NoMedia,
    Io,
    NotFound,
}

/// Card-layer failure taxonomy. Overflow is fatal; everything else is
/// reported as status text and left to the caller to retry or idle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CardError {
    Port(PortError),
    NotMounted,
    VolumeInit,
    DirOpen(ShortName),
    FileOpen(ShortName),
    ProcedureOverflow,
}

impl From<PortError> for CardError {
    fn from(value: PortError) -> Self {
        Self::Port(value)
    }
}

pub fn error_label(error: &CardError) -> &'static str {
    match error {
        CardError::Port(PortError::NoMedia) => "no_media",
        CardError::Port(PortError::Io) => "io_failed",
        CardError::Port(PortError::NotFound) => "not_found",
        CardError::NotMounted => "not_mounted",
        CardError::VolumeInit => "volume_init_failed",
        CardError::DirOpen(_) => "subdir_open_failed",
        CardError::FileOpen(_) => "file_open_failed",
        CardError::ProcedureOverflow => "procedure_overflow",
    }
}

/// Narrow seam to the external volume driver.
///
/// The port owns sector I/O and the FAT structures. This crate only ever
/// asks it to open the root, open an entry it has already been shown as a
/// [`RawDirRecord`], and feed records back one at a time. All calls are
/// synchronous with bounded latency.
///
/// `Dir` is a cheap cursor and may be cloned (the cwd stack keeps clones);
/// a handle returned by an `open_*` call must be given back through the
/// matching `close_*` on every exit path. Closing settles the port's open
/// accounting only, so clones taken earlier stay usable as cursors. `File`
/// is exclusively owned and is moved, never cloned.
pub trait MediaPort {
    type Dir: Clone;
    type File;

    fn init_volume(&mut self) -> Result<(), PortError>;
    fn release_volume(&mut self);

    fn open_root(&mut self) -> Result<Self::Dir, PortError>;
    fn open_dir_at(&mut self, parent: &Self::Dir, record: &RawDirRecord)
        -> Result<Self::Dir, PortError>;
    fn close_dir(&mut self, dir: Self::Dir);

    /// Reset the read cursor to the first record of the directory.
    fn rewind_dir(&mut self, dir: &mut Self::Dir);

    /// Read the next raw record, filling `long_name` with the entry's long
    /// display name when one exists (left empty otherwise). `None` means the
    /// cursor ran past the last record.
    fn read_record(
        &mut self,
        dir: &mut Self::Dir,
        long_name: &mut LongName,
    ) -> Result<Option<RawDirRecord>, PortError>;

    /// Open a file entry for reading from offset 0. Returns the handle and
    /// the file's total size in bytes.
    fn open_file_at(
        &mut self,
        parent: &Self::Dir,
        record: &RawDirRecord,
    ) -> Result<(Self::File, u32), PortError>;
    fn close_file(&mut self, file: Self::File);

    fn read_file(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, PortError>;
    fn seek_file(&mut self, file: &mut Self::File, pos: u32) -> Result<(), PortError>;
}
