use crate::media::{
    CardError, MediaPort, RawDirRecord, ATTR_HIDDEN, ATTR_VOLUME, NAME_DELETED, NAME_FREE,
};
use crate::name::{decode_short_name, display_name};
use crate::{LongName, ShortName};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Folder,
}

/// One visible job item, decoded for the print/UI collaborator.
#[derive(Clone, Debug)]
pub struct EntryInfo {
    pub record: RawDirRecord,
    pub short: ShortName,
    pub long: LongName,
    pub kind: EntryKind,
}

impl EntryInfo {
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, EntryKind::Folder)
    }

    pub fn display(&self) -> &str {
        display_name(self.short.as_str(), self.long.as_str())
    }
}

/// Decide whether a raw record is a visible job item.
///
/// Deleted, dot and hidden records never show. Subdirectories always show.
/// Plain files show only when the extension starts with 'G' and is not a
/// backup copy (second extension byte '~').
pub fn classify(record: &RawDirRecord, long_name: &LongName) -> Option<EntryKind> {
    let first = record.name[0];
    if first == NAME_FREE || first == NAME_DELETED || first == b'.' {
        return None;
    }
    if long_name.as_str().starts_with('.') {
        return None;
    }
    if (record.attr & ATTR_HIDDEN) != 0 {
        return None;
    }
    if record.is_dir() {
        return Some(EntryKind::Folder);
    }
    if (record.attr & ATTR_VOLUME) != 0 {
        return None;
    }
    if record.name[8] == b'G' && record.name[9] != b'~' {
        return Some(EntryKind::File);
    }
    None
}

/// Read records until the next visible item, or the end of the directory.
/// A record whose first name byte is 0x00 marks this and all following
/// slots free, ending the scan early.
pub fn next_visible<P: MediaPort>(
    port: &mut P,
    dir: &mut P::Dir,
) -> Result<Option<EntryInfo>, CardError> {
    let mut long_name = LongName::new();
    loop {
        long_name.clear();
        let record = match port.read_record(dir, &mut long_name)? {
            Some(record) => record,
            None => return Ok(None),
        };
        if record.name[0] == NAME_FREE {
            return Ok(None);
        }
        if let Some(kind) = classify(&record, &long_name) {
            return Ok(Some(EntryInfo {
                record,
                short: decode_short_name(&record.name),
                long: long_name,
                kind,
            }));
        }
    }
}

pub fn count_visible<P: MediaPort>(port: &mut P, dir: &mut P::Dir) -> Result<u16, CardError> {
    port.rewind_dir(dir);
    let mut count = 0u16;
    while next_visible(port, dir)?.is_some() {
        count = count.saturating_add(1);
    }
    Ok(count)
}

/// The `nth` visible entry (0-based raw index, unsorted).
pub fn entry_at<P: MediaPort>(
    port: &mut P,
    dir: &mut P::Dir,
    nth: u16,
) -> Result<Option<EntryInfo>, CardError> {
    port.rewind_dir(dir);
    let mut seen = 0u16;
    while let Some(entry) = next_visible(port, dir)? {
        if seen == nth {
            return Ok(Some(entry));
        }
        seen += 1;
    }
    Ok(None)
}

/// Find a visible entry whose 8.3 or long display name matches, ignoring
/// ASCII case.
pub fn find_by_name<P: MediaPort>(
    port: &mut P,
    dir: &mut P::Dir,
    name: &str,
) -> Result<Option<EntryInfo>, CardError> {
    port.rewind_dir(dir);
    while let Some(entry) = next_visible(port, dir)? {
        if entry.short.as_str().eq_ignore_ascii_case(name)
            || (!entry.long.is_empty() && entry.long.as_str().eq_ignore_ascii_case(name))
        {
            return Ok(Some(entry));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{raw_83, MockPort, MockTree};
    use crate::media::ATTR_DIRECTORY;

    fn record(name: &[u8; 11], attr: u8) -> RawDirRecord {
        RawDirRecord {
            name: *name,
            attr,
            size: 0,
            loc: 0,
        }
    }

    #[test]
    fn folders_are_always_visible() {
        let long = LongName::new();
        let kind = classify(&record(b"SUB        ", ATTR_DIRECTORY), &long);
        assert_eq!(kind, Some(EntryKind::Folder));
    }

    #[test]
    fn hidden_and_deleted_records_are_excluded() {
        let long = LongName::new();
        assert_eq!(classify(&record(b"PART1   GCO", ATTR_HIDDEN), &long), None);
        assert_eq!(classify(&record(b"\xE5ART1   GCO", 0), &long), None);
        assert_eq!(classify(&record(b".          ", ATTR_DIRECTORY), &long), None);
    }

    #[test]
    fn dot_long_names_are_excluded() {
        let mut long = LongName::new();
        long.push_str(".hidden.gco").unwrap();
        assert_eq!(classify(&record(b"HIDDEN~1GCO", 0), &long), None);
    }

    #[test]
    fn only_gcode_files_show_and_backups_never_do() {
        let long = LongName::new();
        assert_eq!(classify(&record(b"PART1   GCO", 0), &long), Some(EntryKind::File));
        assert_eq!(classify(&record(b"MACRO   G  ", 0), &long), Some(EntryKind::File));
        assert_eq!(classify(&record(b"PART1   G~1", 0), &long), None);
        assert_eq!(classify(&record(b"NOTES   TXT", 0), &long), None);
        assert_eq!(classify(&record(b"LABEL      ", ATTR_VOLUME), &long), None);
    }

    #[test]
    fn raw_index_walks_only_visible_entries() {
        let mut tree = MockTree::new();
        let root = tree.root();
        tree.add_file(root, "A.GCO", None, b"");
        tree.add_plain(root, "README.TXT");
        tree.add_file(root, "B.GCO", None, b"");
        let mut port = MockPort::new(tree);
        port.init_volume().unwrap();
        let mut dir = port.open_root().unwrap();

        assert_eq!(count_visible(&mut port, &mut dir).unwrap(), 2);
        let second = entry_at(&mut port, &mut dir, 1).unwrap().unwrap();
        assert_eq!(second.short.as_str(), "B.GCO");
        assert!(entry_at(&mut port, &mut dir, 2).unwrap().is_none());
        port.close_dir(dir);
    }

    #[test]
    fn decoded_names_resolve_back_to_their_records() {
        // 8.3 round trip: codec output fed to find_by_name lands on the
        // record it came from.
        let mut tree = MockTree::new();
        let root = tree.root();
        tree.add_file(root, "PART1.GCO", None, b"x");
        tree.add_file(root, "CUBE.GCO", Some("calibration cube.gco"), b"y");
        let mut port = MockPort::new(tree);
        port.init_volume().unwrap();
        let mut dir = port.open_root().unwrap();

        for nth in 0..2 {
            let entry = entry_at(&mut port, &mut dir, nth).unwrap().unwrap();
            let by_name = find_by_name(&mut port, &mut dir, entry.short.as_str())
                .unwrap()
                .unwrap();
            assert_eq!(by_name.record.loc, entry.record.loc);
        }
        let by_long = find_by_name(&mut port, &mut dir, "Calibration Cube.GCO")
            .unwrap()
            .unwrap();
        assert_eq!(by_long.short.as_str(), "CUBE.GCO");
        port.close_dir(dir);
    }

    #[test]
    fn raw_83_helper_matches_on_media_layout() {
        assert_eq!(&raw_83("PART1.GCO"), b"PART1   GCO");
        assert_eq!(&raw_83("SUB"), b"SUB        ");
    }
}
