use crate::media::{CardError, MediaPort};
use crate::name::clip_short;
use crate::scan::{self, EntryKind};
use crate::{PathBuf, ShortName, MAX_DIR_DEPTH};

struct CwdEntry<D> {
    dir: D,
    name: ShortName,
}

/// A directory produced by a dive: either a scratch handle this crate
/// opened (closed by `release`) or a borrowed cursor clone of the root or
/// working directory (nothing to close).
#[derive(Debug)]
pub struct DiveDir<D> {
    pub dir: D,
    owned: bool,
}

impl<D> DiveDir<D> {
    pub fn release<P: MediaPort<Dir = D>>(self, port: &mut P) {
        if self.owned {
            port.close_dir(self.dir);
        }
    }
}

/// Path descent and the bounded current-working-directory stack.
///
/// Handles are cheap cursors; the navigator keeps clones and returns every
/// handle it opens before an operation completes, so no more than the two
/// ping-pong scratch handles are ever open at once.
pub struct Navigator<P: MediaPort> {
    root: Option<P::Dir>,
    work: Option<P::Dir>,
    cwd: heapless::Vec<CwdEntry<P::Dir>, MAX_DIR_DEPTH>,
}

impl<P: MediaPort> Navigator<P> {
    pub fn new() -> Self {
        Self {
            root: None,
            work: None,
            cwd: heapless::Vec::new(),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.root.is_some()
    }

    /// Rebuild the volume and the root cursor after media insertion.
    pub fn attach(&mut self, port: &mut P) -> Result<(), CardError> {
        self.detach(port);
        port.init_volume().map_err(|_| CardError::VolumeInit)?;
        let root = port.open_root().map_err(|_| CardError::VolumeInit)?;
        self.root = Some(root.clone());
        port.close_dir(root);
        self.work = self.root.clone();
        Ok(())
    }

    pub fn detach(&mut self, port: &mut P) {
        self.cwd.clear();
        self.work = None;
        if self.root.take().is_some() {
            port.release_volume();
        }
    }

    pub fn depth(&self) -> usize {
        self.cwd.len()
    }

    /// Cursor clone of the current working directory (root when at top).
    pub fn work_dir(&self) -> Result<P::Dir, CardError> {
        self.work
            .clone()
            .or_else(|| self.root.clone())
            .ok_or(CardError::NotMounted)
    }

    pub fn set_root(&mut self) {
        self.cwd.clear();
        self.work = self.root.clone();
    }

    /// Enter a subdirectory of the working directory by display name.
    pub fn chdir(&mut self, port: &mut P, name: &str) -> Result<(), CardError> {
        let mut parent = self.work_dir()?;
        let entry = scan::find_by_name(port, &mut parent, name)?
            .filter(|entry| entry.kind == EntryKind::Folder)
            .ok_or_else(|| CardError::DirOpen(clip_short(name)))?;
        let child = port
            .open_dir_at(&parent, &entry.record)
            .map_err(|_| CardError::DirOpen(clip_short(name)))?;
        self.work = Some(child.clone());
        self.remember(child.clone(), entry.short);
        port.close_dir(child);
        Ok(())
    }

    /// Step up to the parent directory; returns the new depth.
    pub fn updir(&mut self) -> usize {
        if self.cwd.pop().is_some() {
            self.work = match self.cwd.last() {
                Some(entry) => Some(entry.dir.clone()),
                None => self.root.clone(),
            };
        }
        self.cwd.len()
    }

    /// Resolve a slash-delimited path to the directory containing its final
    /// element plus the leaf segment (empty when the path names a directory).
    ///
    /// Descent uses two alternating scratch handles so at most two directory
    /// handles are open regardless of depth. With `update_cwd`, each level is
    /// remembered on the cwd stack, silently capped at MAX_DIR_DEPTH. A
    /// failed segment aborts immediately; levels already remembered are
    /// deliberately kept (callers retry from root and depend on this).
    pub fn dive_to_file<'p>(
        &mut self,
        port: &mut P,
        path: &'p str,
        update_cwd: bool,
    ) -> Result<(DiveDir<P::Dir>, &'p str), CardError> {
        let absolute = path.starts_with('/');
        let mut cur = if absolute {
            if update_cwd {
                self.cwd.clear();
                self.work = self.root.clone();
            }
            self.root.clone().ok_or(CardError::NotMounted)?
        } else {
            self.work_dir()?
        };
        let mut owned = false;

        let (dir_part, leaf) = match path.rfind('/') {
            Some(idx) => (&path[..idx], &path[idx + 1..]),
            None => ("", path),
        };

        for atom in dir_part.split('/').filter(|atom| !atom.is_empty()) {
            let found = scan::find_by_name(port, &mut cur, atom)?
                .filter(|entry| entry.kind == EntryKind::Folder);
            let entry = match found {
                Some(entry) => entry,
                None => {
                    if owned {
                        port.close_dir(cur);
                    }
                    return Err(CardError::DirOpen(clip_short(atom)));
                }
            };
            let child = match port.open_dir_at(&cur, &entry.record) {
                Ok(child) => child,
                Err(_) => {
                    if owned {
                        port.close_dir(cur);
                    }
                    return Err(CardError::DirOpen(clip_short(atom)));
                }
            };
            if update_cwd {
                self.remember(child.clone(), entry.short);
            }
            if owned {
                port.close_dir(cur);
            }
            cur = child;
            owned = true;
        }

        if update_cwd {
            self.work = Some(cur.clone());
        }
        Ok((DiveDir { dir: cur, owned }, leaf))
    }

    /// Reconstruct the absolute path of the working directory, with a
    /// trailing slash ("/" at root, "/JOBS/" one level down).
    pub fn abs_path(&self, out: &mut PathBuf) {
        out.clear();
        let _ = out.push('/');
        for entry in self.cwd.iter() {
            let _ = out.push_str(entry.name.as_str());
            let _ = out.push('/');
        }
    }

    fn remember(&mut self, dir: P::Dir, name: ShortName) {
        // Past MAX_DIR_DEPTH the prefix silently degrades; navigation
        // itself keeps working.
        let _ = self.cwd.push(CwdEntry { dir, name });
    }
}

impl<P: MediaPort> Default for Navigator<P> {
    fn default() -> Self {
        Self::new()
    }
}
