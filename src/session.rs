use core::fmt::Write as _;

use crate::media::{error_label, CardError, MediaPort};
use crate::name::clip_short;
use crate::nav::Navigator;
use crate::scan::{self, EntryInfo, EntryKind};
use crate::sort::{DirSorter, FolderSorting, SortIndex, SortTier};
use crate::{PathBuf, ShortName, PROCEDURE_DEPTH};

/// Listing-sort knobs, fixed for the life of a session.
#[derive(Clone, Copy, Debug)]
pub struct SortConfig {
    pub tier: SortTier,
    pub folders: FolderSorting,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            tier: SortTier::FullCache,
            folders: FolderSorting::First,
        }
    }
}

/// Host-side collaborators notified of media and job edges. Every method
/// has a no-op default so integrations implement only what they watch.
pub trait CardHooks {
    fn on_mount(&mut self) {}
    fn on_unmount(&mut self) {}
    fn on_print_abort(&mut self) {}
    fn on_job_complete(&mut self) {}

    /// Offered once after a successful mount. Return true to take over and
    /// resume an interrupted job; this suppresses the autostart scan.
    fn recover_job(&mut self) -> bool {
        false
    }
}

/// For drivers that watch nothing.
impl CardHooks for () {}

/// What the reader should do after the current file ran out of bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// A suspended parent file was reopened and repositioned; keep reading.
    Resumed,
    /// No parent remained, the job is over.
    JobComplete,
}

struct OpenJob<F> {
    file: F,
    size: u32,
    pos: u32,
    short: ShortName,
}

struct ProcedureFrame {
    path: PathBuf,
    pos: u32,
}

/// One mounted card: navigation, sorted listings, the open job file and its
/// suspended parents. All volume access flows through the caller-supplied
/// port, the session itself owns no I/O.
pub struct CardSession<P: MediaPort> {
    nav: Navigator<P>,
    sorter: DirSorter,
    folders: FolderSorting,
    sort_index: Option<SortIndex>,
    job: Option<OpenJob<P::File>>,
    frames: heapless::Vec<ProcedureFrame, PROCEDURE_DEPTH>,
    printing: bool,
    halted: bool,
    autostart_index: Option<u8>,
}

impl<P: MediaPort> CardSession<P> {
    pub fn new(config: SortConfig) -> Self {
        Self {
            nav: Navigator::new(),
            sorter: DirSorter::new(config.tier),
            folders: config.folders,
            sort_index: None,
            job: None,
            frames: heapless::Vec::new(),
            printing: false,
            halted: false,
            autostart_index: None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.nav.is_attached()
    }

    pub fn is_printing(&self) -> bool {
        self.printing
    }

    /// Latched true after a procedure stack overflow; cleared only by a
    /// fresh session.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Bring up the volume and sort the root listing.
    pub fn mount(&mut self, port: &mut P) -> Result<(), CardError> {
        if let Err(err) = self.nav.attach(port) {
            log::warn!("card: mount_failed reason={}", error_label(&err));
            return Err(err);
        }
        self.presort(port)?;
        log::info!("card: mounted");
        Ok(())
    }

    /// Tear down all volume state. Safe to call with media already gone:
    /// nothing here touches the card.
    pub fn release(&mut self, port: &mut P) {
        if let Some(job) = self.job.take() {
            port.close_file(job.file);
        }
        self.frames.clear();
        self.printing = false;
        self.sort_index = None;
        self.nav.detach(port);
        log::info!("card: released");
    }

    // ---- listing ----

    pub fn file_count(&mut self, port: &mut P) -> Result<u16, CardError> {
        let mut dir = self.nav.work_dir()?;
        scan::count_visible(port, &mut dir)
    }

    /// Rebuild the sorted view of the working directory.
    pub fn presort(&mut self, port: &mut P) -> Result<(), CardError> {
        if !self.nav.is_attached() {
            return Ok(());
        }
        let mut dir = self.nav.work_dir()?;
        let visible = scan::count_visible(port, &mut dir)?;
        let order = self.sorter.presort(port, &mut dir, visible, self.folders)?;
        self.sort_index = Some(order);
        Ok(())
    }

    pub fn flush_presort(&mut self) {
        self.sort_index = None;
    }

    /// Entries covered by the current sort index (zero when unsorted).
    pub fn sorted_count(&self) -> usize {
        self.sort_index.as_ref().map_or(0, |order| order.len())
    }

    /// The nth entry in sorted order. Positions beyond the sort window fall
    /// back to raw scan order, so every visible entry stays reachable.
    pub fn entry_sorted(&mut self, port: &mut P, nth: u16) -> Result<Option<EntryInfo>, CardError> {
        let raw = match &self.sort_index {
            Some(order) if (nth as usize) < order.len() => order[nth as usize] as u16,
            _ => nth,
        };
        self.entry_at(port, raw)
    }

    /// Sorted display name and directory flag straight from the full cache,
    /// with no card I/O. `None` outside the cache or on leaner tiers.
    pub fn display_sorted(&self, nth: u16) -> Option<(&str, bool)> {
        let order = self.sort_index.as_ref()?;
        let raw = *order.get(nth as usize)?;
        let (short, long, is_dir) = self.sorter.cached(raw)?;
        Some((crate::name::display_name(short, long), is_dir))
    }

    pub fn entry_at(&mut self, port: &mut P, nth: u16) -> Result<Option<EntryInfo>, CardError> {
        let mut dir = self.nav.work_dir()?;
        scan::entry_at(port, &mut dir, nth)
    }

    pub fn entry_by_name(&mut self, port: &mut P, name: &str) -> Result<Option<EntryInfo>, CardError> {
        let mut dir = self.nav.work_dir()?;
        scan::find_by_name(port, &mut dir, name)
    }

    // ---- navigation ----

    pub fn chdir(&mut self, port: &mut P, name: &str) -> Result<(), CardError> {
        self.nav.chdir(port, name)?;
        self.presort(port)
    }

    pub fn updir(&mut self, port: &mut P) -> Result<usize, CardError> {
        let depth = self.nav.updir();
        self.presort(port)?;
        Ok(depth)
    }

    pub fn set_root(&mut self, port: &mut P) -> Result<(), CardError> {
        self.nav.set_root();
        self.presort(port)
    }

    pub fn depth(&self) -> usize {
        self.nav.depth()
    }

    pub fn cwd_path(&self, out: &mut PathBuf) {
        self.nav.abs_path(out);
    }

    // ---- job files ----

    /// Open a fresh job, discarding any suspended parents.
    pub fn open_job(&mut self, port: &mut P, path: &str) -> Result<(), CardError> {
        self.open_for_read(port, path, true)
    }

    /// Suspend the open job (remembering its position) and switch to the
    /// named file. With no job open this is a fresh open.
    pub fn call(&mut self, port: &mut P, path: &str) -> Result<(), CardError> {
        if self.halted {
            return Err(CardError::ProcedureOverflow);
        }
        if self.job.is_none() {
            return self.open_for_read(port, path, true);
        }
        if self.frames.is_full() {
            self.halted = true;
            log::error!("card: procedure_overflow depth={}", self.frames.len());
            return Err(CardError::ProcedureOverflow);
        }
        let mut frame = ProcedureFrame {
            path: PathBuf::new(),
            pos: 0,
        };
        if let Some(job) = &self.job {
            frame.pos = job.pos;
        }
        self.job_abs_path(&mut frame.path);
        // Capacity checked above.
        let _ = self.frames.push(frame);
        self.open_for_read(port, path, false)
    }

    /// Read the next chunk of the job file. With no job open, reads nothing.
    pub fn read(&mut self, port: &mut P, buf: &mut [u8]) -> Result<usize, CardError> {
        let Some(job) = &mut self.job else {
            return Ok(0);
        };
        let n = port.read_file(&mut job.file, buf)?;
        job.pos = job.pos.saturating_add(n as u32);
        Ok(n)
    }

    pub fn seek(&mut self, port: &mut P, pos: u32) -> Result<(), CardError> {
        if let Some(job) = &mut self.job {
            port.seek_file(&mut job.file, pos)?;
            job.pos = pos;
        }
        Ok(())
    }

    /// Byte position and size of the open job file.
    pub fn progress(&self) -> Option<(u32, u32)> {
        self.job.as_ref().map(|job| (job.pos, job.size))
    }

    pub fn eof(&self) -> bool {
        self.job.as_ref().map_or(true, |job| job.pos >= job.size)
    }

    pub fn start_print(&mut self) {
        if self.job.is_some() {
            self.printing = true;
            log::info!("card: print_start");
        }
    }

    /// Hard-stop the job: close the file, drop every suspended parent and
    /// the stale sort index.
    pub fn abort_print(&mut self, port: &mut P) {
        if let Some(job) = self.job.take() {
            port.close_file(job.file);
        }
        self.frames.clear();
        self.printing = false;
        self.sort_index = None;
        log::warn!("card: print_abort");
    }

    /// The open file ran out of bytes: pop back into the suspended parent,
    /// or finish the job when none remains (notifying the hooks).
    pub fn file_finished<H: CardHooks>(
        &mut self,
        port: &mut P,
        hooks: &mut H,
    ) -> Result<JobOutcome, CardError> {
        if let Some(job) = self.job.take() {
            port.close_file(job.file);
        }
        if let Some(frame) = self.frames.pop() {
            self.open_for_read(port, frame.path.as_str(), false)?;
            self.seek(port, frame.pos)?;
            log::info!("card: resume name={} pos={}", frame.path.as_str(), frame.pos);
            return Ok(JobOutcome::Resumed);
        }
        self.printing = false;
        self.presort(port)?;
        log::info!("card: print_done");
        hooks.on_job_complete();
        Ok(JobOutcome::JobComplete)
    }

    /// Absolute path and position of the open job, for resume-after-reset
    /// snapshots. `None` with no job open.
    pub fn job_snapshot(&self, out: &mut PathBuf) -> Option<u32> {
        let job = self.job.as_ref()?;
        self.job_abs_path(out);
        debug_assert!(out.as_str().ends_with(job.short.as_str()));
        Some(job.pos)
    }

    // ---- autostart ----

    /// Arm the boot scan for `auto0.g`, `auto1.g`, ...
    pub fn begin_autostart(&mut self) {
        self.autostart_index = Some(0);
    }

    /// Run one step of the autostart scan. Returns true while a file was
    /// found and started; the scan disarms itself on the first gap.
    pub fn check_autostart(&mut self, port: &mut P) -> Result<bool, CardError> {
        let Some(i) = self.autostart_index else {
            return Ok(false);
        };
        if !self.nav.is_attached() {
            return Ok(false);
        }
        let mut path = PathBuf::new();
        // "auto" + index + ".g" always fits.
        let _ = write!(path, "/auto{}.g", i);
        match self.open_job(port, path.as_str()) {
            Ok(()) => {
                self.autostart_index = Some(i.saturating_add(1));
                self.start_print();
                log::info!("card: autostart name={}", path.as_str());
                Ok(true)
            }
            Err(CardError::FileOpen(_)) => {
                // First gap in the sequence ends the scan.
                self.autostart_index = None;
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    // ---- internals ----

    fn open_for_read(&mut self, port: &mut P, path: &str, fresh: bool) -> Result<(), CardError> {
        if !self.nav.is_attached() {
            return Err(CardError::NotMounted);
        }
        if fresh {
            self.frames.clear();
        }
        if let Some(job) = self.job.take() {
            port.close_file(job.file);
        }
        let (dive, leaf) = self.nav.dive_to_file(port, path, false)?;
        let opened = open_leaf(port, &dive.dir, leaf);
        dive.release(port);
        let (file, size, short) = opened?;
        log::info!("card: file_opened name={} size={}", short.as_str(), size);
        self.job = Some(OpenJob {
            file,
            size,
            pos: 0,
            short,
        });
        Ok(())
    }

    fn job_abs_path(&self, out: &mut PathBuf) {
        self.nav.abs_path(out);
        if let Some(job) = &self.job {
            let _ = out.push_str(job.short.as_str());
        }
    }
}

fn open_leaf<P: MediaPort>(
    port: &mut P,
    dir: &P::Dir,
    leaf: &str,
) -> Result<(P::File, u32, ShortName), CardError> {
    let mut cursor = dir.clone();
    let entry = scan::find_by_name(port, &mut cursor, leaf)?
        .filter(|entry| entry.kind == EntryKind::File)
        .ok_or_else(|| CardError::FileOpen(clip_short(leaf)))?;
    let (file, size) = port
        .open_file_at(&cursor, &entry.record)
        .map_err(|_| CardError::FileOpen(clip_short(leaf)))?;
    Ok((file, size, entry.short))
}
