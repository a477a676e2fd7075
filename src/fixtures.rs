//! In-memory stand-in for the external volume driver, with handle-budget
//! accounting so tests can assert the two-scratch-handle discipline.

use std::cell::Cell;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType, InputPin};

use crate::media::{MediaPort, PortError, RawDirRecord, ATTR_DIRECTORY};
use crate::name::append_clamped;
use crate::LongName;

/// Lay a display name out as an on-media 8+3 field.
pub fn raw_83(name: &str) -> [u8; 11] {
    let mut raw = [b' '; 11];
    let upper = name.to_ascii_uppercase();
    let (base, ext) = match upper.split_once('.') {
        Some((base, ext)) => (base, ext),
        None => (upper.as_str(), ""),
    };
    for (i, b) in base.bytes().take(8).enumerate() {
        raw[i] = b;
    }
    for (i, b) in ext.bytes().take(3).enumerate() {
        raw[8 + i] = b;
    }
    raw
}

#[derive(Clone)]
struct Node {
    raw: [u8; 11],
    attr: u8,
    long: Option<String>,
    data: Vec<u8>,
    children: Vec<usize>,
}

#[derive(Clone)]
pub struct MockTree {
    nodes: Vec<Node>,
}

impl MockTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                raw: [b' '; 11],
                attr: ATTR_DIRECTORY,
                long: None,
                data: Vec::new(),
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn add_raw(
        &mut self,
        parent: usize,
        raw: [u8; 11],
        attr: u8,
        long: Option<&str>,
        data: &[u8],
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node {
            raw,
            attr,
            long: long.map(String::from),
            data: data.to_vec(),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn add_dir(&mut self, parent: usize, name: &str) -> usize {
        self.add_raw(parent, raw_83(name), ATTR_DIRECTORY, None, b"")
    }

    pub fn add_dir_long(&mut self, parent: usize, name: &str, long: &str) -> usize {
        self.add_raw(parent, raw_83(name), ATTR_DIRECTORY, Some(long), b"")
    }

    pub fn add_file(&mut self, parent: usize, name: &str, long: Option<&str>, data: &[u8]) -> usize {
        self.add_raw(parent, raw_83(name), 0, long, data)
    }

    /// A file the job filter must never show (wrong extension).
    pub fn add_plain(&mut self, parent: usize, name: &str) -> usize {
        self.add_raw(parent, raw_83(name), 0, None, b"")
    }
}

#[derive(Clone, Debug)]
pub struct MockDir {
    node: usize,
    pos: usize,
}

pub struct MockFile {
    node: usize,
    pos: u32,
}

pub struct MockPort {
    tree: MockTree,
    mounted: bool,
    pub fail_init: bool,
    live_dirs: i32,
    pub max_live_dirs: i32,
    live_files: i32,
    pub max_live_files: i32,
    pub dir_opens: u32,
    pub dir_closes: u32,
}

impl MockPort {
    pub fn new(tree: MockTree) -> Self {
        Self {
            tree,
            mounted: false,
            fail_init: false,
            live_dirs: 0,
            max_live_dirs: 0,
            live_files: 0,
            max_live_files: 0,
            dir_opens: 0,
            dir_closes: 0,
        }
    }

    pub fn live_dirs(&self) -> i32 {
        self.live_dirs
    }

    pub fn live_files(&self) -> i32 {
        self.live_files
    }

    fn track_dir_open(&mut self) {
        self.live_dirs += 1;
        self.dir_opens += 1;
        self.max_live_dirs = self.max_live_dirs.max(self.live_dirs);
    }

    fn record_for(&self, node: usize) -> RawDirRecord {
        let entry = &self.tree.nodes[node];
        RawDirRecord {
            name: entry.raw,
            attr: entry.attr,
            size: entry.data.len() as u32,
            loc: node as u32,
        }
    }
}

impl MediaPort for MockPort {
    type Dir = MockDir;
    type File = MockFile;

    fn init_volume(&mut self) -> Result<(), PortError> {
        if self.fail_init {
            return Err(PortError::NoMedia);
        }
        self.mounted = true;
        Ok(())
    }

    fn release_volume(&mut self) {
        self.mounted = false;
    }

    fn open_root(&mut self) -> Result<MockDir, PortError> {
        if !self.mounted {
            return Err(PortError::NoMedia);
        }
        self.track_dir_open();
        Ok(MockDir {
            node: self.tree.root(),
            pos: 0,
        })
    }

    fn open_dir_at(&mut self, _parent: &MockDir, record: &RawDirRecord) -> Result<MockDir, PortError> {
        let node = record.loc as usize;
        if node >= self.tree.nodes.len() || (self.tree.nodes[node].attr & ATTR_DIRECTORY) == 0 {
            return Err(PortError::NotFound);
        }
        self.track_dir_open();
        Ok(MockDir { node, pos: 0 })
    }

    fn close_dir(&mut self, _dir: MockDir) {
        self.live_dirs -= 1;
        self.dir_closes += 1;
        assert!(self.live_dirs >= 0, "directory handle closed twice");
    }

    fn rewind_dir(&mut self, dir: &mut MockDir) {
        dir.pos = 0;
    }

    fn read_record(
        &mut self,
        dir: &mut MockDir,
        long_name: &mut LongName,
    ) -> Result<Option<RawDirRecord>, PortError> {
        let children = &self.tree.nodes[dir.node].children;
        let Some(&child) = children.get(dir.pos) else {
            return Ok(None);
        };
        dir.pos += 1;
        if let Some(long) = &self.tree.nodes[child].long {
            append_clamped(long_name, long);
        }
        Ok(Some(self.record_for(child)))
    }

    fn open_file_at(
        &mut self,
        _parent: &MockDir,
        record: &RawDirRecord,
    ) -> Result<(MockFile, u32), PortError> {
        let node = record.loc as usize;
        if node >= self.tree.nodes.len() || (self.tree.nodes[node].attr & ATTR_DIRECTORY) != 0 {
            return Err(PortError::NotFound);
        }
        self.live_files += 1;
        self.max_live_files = self.max_live_files.max(self.live_files);
        let size = self.tree.nodes[node].data.len() as u32;
        Ok((MockFile { node, pos: 0 }, size))
    }

    fn close_file(&mut self, _file: MockFile) {
        self.live_files -= 1;
        assert!(self.live_files >= 0, "file handle closed twice");
    }

    fn read_file(&mut self, file: &mut MockFile, buf: &mut [u8]) -> Result<usize, PortError> {
        let data = &self.tree.nodes[file.node].data;
        let start = (file.pos as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        file.pos += n as u32;
        Ok(n)
    }

    fn seek_file(&mut self, file: &mut MockFile, pos: u32) -> Result<(), PortError> {
        let size = self.tree.nodes[file.node].data.len() as u32;
        if pos > size {
            return Err(PortError::Io);
        }
        file.pos = pos;
        Ok(())
    }
}

/// Detect pin whose level tests flip from outside the lifecycle.
#[derive(Clone)]
pub struct MockPin {
    level: Rc<Cell<bool>>,
}

impl MockPin {
    pub fn new(high: bool) -> (Self, Rc<Cell<bool>>) {
        let level = Rc::new(Cell::new(high));
        (
            Self {
                level: level.clone(),
            },
            level,
        )
    }
}

impl ErrorType for MockPin {
    type Error = core::convert::Infallible;
}

impl InputPin for MockPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.get())
    }
}
