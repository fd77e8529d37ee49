//! Record store for rosters and their rows.
//!
//! State lives in memory behind a mutex. Writes go through [`RecordStore::transaction`],
//! which applies a closure to a working copy and swaps it in only if the closure
//! succeeds. When opened on a directory, every commit also rewrites a JSON snapshot
//! (temp file + rename) that is loaded back on the next start.
//!
//! Several handles may share one directory (the server and a CLI import, say).
//! Commits hold an exclusive lock on `store.lock` and start from the snapshot on
//! disk, so one handle never overwrites another's work. Reads reload the snapshot
//! when it changed since the handle last saw it.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use crate::api::logs::log_warning;
use crate::error::{StoreError, StoreResult};
use crate::models::{Roster, RosterId, RosterKind, Row, RowFields, RowId};

/// Snapshot file name inside the data directory.
const SNAPSHOT_FILE: &str = "store.json";
/// Lock file serializing writers across processes.
const LOCK_FILE: &str = "store.lock";

/// Everything the store holds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    next_roster_id: RosterId,
    next_row_id: RowId,
    rosters: BTreeMap<RosterId, Roster>,
    rows: BTreeMap<RosterId, Vec<Row>>,
}

impl StoreState {
    fn find_roster(&self, kind: RosterKind, label: &str) -> Option<&Roster> {
        self.rosters.values().find(|r| r.matches_key(kind, label))
    }
}

/// Identifies one version of the snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stamp {
    modified: SystemTime,
    len: u64,
}

/// On-disk side of a persisted store.
struct Snapshot {
    path: PathBuf,
    lock: File,
}

impl Snapshot {
    fn stamp(&self) -> StoreResult<Option<Stamp>> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(Stamp {
                modified: meta.modified()?,
                len: meta.len(),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self) -> StoreResult<(StoreState, Option<Stamp>)> {
        let stamp = self.stamp()?;
        let state = match stamp {
            Some(_) => serde_json::from_str(&fs::read_to_string(&self.path)?)?,
            None => StoreState::default(),
        };
        Ok((state, stamp))
    }

    fn write(&self, state: &StoreState) -> StoreResult<Option<Stamp>> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(state)?)?;
        fs::rename(&tmp, &self.path)?;
        self.stamp()
    }

    fn lock_exclusive(&self) -> StoreResult<WriterLock<'_>> {
        FileExt::lock_exclusive(&self.lock)?;
        Ok(WriterLock(&self.lock))
    }
}

/// Held for the duration of a commit; released on drop.
struct WriterLock<'a>(&'a File);

impl Drop for WriterLock<'_> {
    fn drop(&mut self) {
        let _ = FileExt::unlock(self.0);
    }
}

/// In-memory state and the snapshot version it came from.
#[derive(Default)]
struct Loaded {
    state: StoreState,
    stamp: Option<Stamp>,
}

/// Transactional store for rosters and rows.
pub struct RecordStore {
    snapshot: Option<Snapshot>,
    loaded: Mutex<Loaded>,
}

impl RecordStore {
    /// A store with no snapshot on disk.
    pub fn in_memory() -> Self {
        Self {
            snapshot: None,
            loaded: Mutex::new(Loaded::default()),
        }
    }

    /// Open a store persisted under `dir`, loading the existing snapshot if any.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(dir.join(LOCK_FILE))?;
        let snapshot = Snapshot {
            path: dir.join(SNAPSHOT_FILE),
            lock,
        };
        let (state, stamp) = snapshot.load()?;

        Ok(Self {
            snapshot: Some(snapshot),
            loaded: Mutex::new(Loaded { state, stamp }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Loaded> {
        self.loaded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current state, reloaded first if another handle committed since.
    fn read(&self) -> MutexGuard<'_, Loaded> {
        let mut guard = self.lock();
        if let Some(snapshot) = &self.snapshot {
            if let Err(e) = refresh(snapshot, &mut guard) {
                log_warning(format!("Could not reload {}: {}", snapshot.path.display(), e));
            }
        }
        guard
    }

    /// Roster for (kind, label), if one exists.
    pub fn find_roster(&self, kind: RosterKind, label: &str) -> Option<Roster> {
        self.read().state.find_roster(kind, label).cloned()
    }

    pub fn get_roster(&self, id: RosterId) -> StoreResult<Roster> {
        self.read()
            .state
            .rosters
            .get(&id)
            .cloned()
            .ok_or(StoreError::RosterNotFound(id))
    }

    /// All rosters, most recently uploaded first.
    pub fn list_rosters(&self) -> Vec<Roster> {
        let mut rosters: Vec<Roster> = self.read().state.rosters.values().cloned().collect();
        rosters.sort_by(|a, b| {
            b.uploaded_at
                .cmp(&a.uploaded_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        rosters
    }

    /// Rows of a roster in insertion order.
    pub fn rows(&self, id: RosterId) -> StoreResult<Vec<Row>> {
        let guard = self.read();
        if !guard.state.rosters.contains_key(&id) {
            return Err(StoreError::RosterNotFound(id));
        }
        Ok(guard.state.rows.get(&id).cloned().unwrap_or_default())
    }

    pub fn row_count(&self, id: RosterId) -> usize {
        self.read().state.rows.get(&id).map_or(0, Vec::len)
    }

    /// Run `f` atomically.
    ///
    /// Writers are serialized by the store lock, and across handles by the lock
    /// file. `f` always sees the latest committed snapshot. If `f` returns an
    /// error, or the snapshot cannot be written, nothing `f` did is visible
    /// afterwards.
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut guard = self.lock();

        let Some(snapshot) = &self.snapshot else {
            let mut working = guard.state.clone();
            let value = f(&mut Transaction { state: &mut working })?;
            guard.state = working;
            return Ok(value);
        };

        let _writer = snapshot.lock_exclusive().map_err(E::from)?;
        let (mut working, _) = snapshot.load().map_err(E::from)?;

        let value = f(&mut Transaction { state: &mut working })?;

        let stamp = snapshot.write(&working).map_err(E::from)?;
        *guard = Loaded {
            state: working,
            stamp,
        };
        Ok(value)
    }

    /// Clear every uploader/modifier reference to `username`.
    ///
    /// Returns the number of rosters touched.
    pub fn forget_user(&self, username: &str) -> StoreResult<usize> {
        self.transaction(|tx| Ok(tx.forget_user(username)))
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn refresh(snapshot: &Snapshot, loaded: &mut Loaded) -> StoreResult<()> {
    if snapshot.stamp()? != loaded.stamp {
        let (state, stamp) = snapshot.load()?;
        *loaded = Loaded { state, stamp };
    }
    Ok(())
}

/// Working copy handed to a [`RecordStore::transaction`] closure.
pub struct Transaction<'a> {
    state: &'a mut StoreState,
}

impl Transaction<'_> {
    pub fn find_roster(&self, kind: RosterKind, label: &str) -> Option<Roster> {
        self.state.find_roster(kind, label).cloned()
    }

    /// Create a roster. Fails if (kind, label) is taken.
    pub fn insert_roster(
        &mut self,
        kind: RosterKind,
        label: &str,
        user: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Roster> {
        if self.state.find_roster(kind, label).is_some() {
            return Err(StoreError::DuplicateRoster {
                kind,
                label: label.to_string(),
            });
        }

        self.state.next_roster_id += 1;
        let roster = Roster {
            id: self.state.next_roster_id,
            kind,
            label: label.to_string(),
            uploaded_by: Some(user.to_string()),
            uploaded_at: now,
            last_modified_by: None,
            last_modified_at: None,
        };
        self.state.rosters.insert(roster.id, roster.clone());
        Ok(roster)
    }

    /// Record `user` as last modifier.
    pub fn touch_roster(
        &mut self,
        id: RosterId,
        user: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Roster> {
        let roster = self
            .state
            .rosters
            .get_mut(&id)
            .ok_or(StoreError::RosterNotFound(id))?;
        roster.last_modified_by = Some(user.to_string());
        roster.last_modified_at = Some(now);
        Ok(roster.clone())
    }

    /// Delete every row of a roster, returning how many went.
    pub fn delete_rows(&mut self, id: RosterId) -> usize {
        self.state.rows.remove(&id).map_or(0, |rows| rows.len())
    }

    pub fn insert_row(&mut self, roster_id: RosterId, fields: RowFields) -> StoreResult<RowId> {
        if !self.state.rosters.contains_key(&roster_id) {
            return Err(StoreError::RosterNotFound(roster_id));
        }

        self.state.next_row_id += 1;
        let id = self.state.next_row_id;
        self.state.rows.entry(roster_id).or_default().push(Row {
            id,
            roster_id,
            fields,
        });
        Ok(id)
    }

    fn forget_user(&mut self, username: &str) -> usize {
        let mut touched = 0;
        for roster in self.state.rosters.values_mut() {
            let mut changed = false;
            if roster.uploaded_by.as_deref() == Some(username) {
                roster.uploaded_by = None;
                changed = true;
            }
            if roster.last_modified_by.as_deref() == Some(username) {
                roster.last_modified_by = None;
                changed = true;
            }
            if changed {
                touched += 1;
            }
        }
        touched
    }
}
