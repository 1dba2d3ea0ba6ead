//! Stream-wide index assignment, segment rollover, and a bounded cache of
//! open segments.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::{self, WalConfig};
use crate::error::{Result, WalError};
use crate::segment::Segment;

const RECORDS_PER_SEGMENT: u64 = 1000;

/// Maps a stream-monotonic index to its owning segment's file name:
/// `format!("{:017}.dat", index / 1000)`.
pub fn segnum_to_name(index: u64) -> String {
    format!("{:017}.dat", index / RECORDS_PER_SEGMENT)
}

fn strip_trailing_separator(dir: &Path) -> PathBuf {
    let s = dir.to_string_lossy();
    let trimmed = s.trim_end_matches('/');
    PathBuf::from(trimmed)
}

/// Lists a directory's `.dat` segment files, sorted lexicographically
/// (equivalent to numeric order since names are zero-padded to 17 digits).
fn sorted_segment_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    if !dir.exists() {
        return Ok(paths);
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }
        let path = entry.path();
        let is_dat = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|name| name.ends_with(".dat"))
            .unwrap_or(false);
        if is_dat {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Reads the `index` field of the first line of a map file, if any.
fn first_map_index(map_path: &Path) -> Option<u64> {
    let file = fs::File::open(map_path).ok()?;
    let line = BufReader::new(file).lines().next()?.ok()?;
    let idx_str = line.split('|').next()?;
    idx_str.parse::<u64>().ok()
}

/// Reads the max `index` field across all lines of a map file.
fn max_map_index(map_path: &Path) -> Option<u64> {
    let file = fs::File::open(map_path).ok()?;
    let mut biggest = None;
    for line in BufReader::new(file).lines().map_while(|l| l.ok()) {
        if let Some(idx_str) = line.split('|').next() {
            if let Ok(idx) = idx_str.parse::<u64>() {
                biggest = Some(biggest.map_or(idx, |b: u64| b.max(idx)));
            }
        }
    }
    biggest
}

struct ManagerState {
    loaded: BTreeMap<PathBuf, Segment>,
    master_index: u64,
    min_index: u64,
}

/// Owns one stream's directory of segments: assigns the next index,
/// rolls over to a new segment every 1000 records, and keeps at most
/// `max_loaded_segments` segments open at once.
pub struct SegmentManager {
    dir: PathBuf,
    max_loaded: usize,
    state: Mutex<ManagerState>,
}

impl SegmentManager {
    /// Opens (recovering state from existing segments) or creates the
    /// stream directory at `dir`.
    pub fn open(dir: PathBuf, cfg: WalConfig) -> Result<Self> {
        let dir = strip_trailing_separator(&dir);
        if !dir.exists() {
            config::create_dir(&dir, cfg.dir_mode)?;
        }

        let segments = sorted_segment_paths(&dir)?;

        let mut master_index = 0u64;
        let mut min_index = 0u64;
        if let Some(highest) = segments.last() {
            let map = map_path(highest);
            let biggest = max_map_index(&map).unwrap_or(0);
            master_index = biggest + 1;
            log::debug!("resuming stream {} with index {master_index}", dir.display());
        }
        if let Some(lowest) = segments.first() {
            let map = map_path(lowest);
            if let Some(first) = first_map_index(&map) {
                min_index = first;
            }
        }

        Ok(Self {
            dir,
            max_loaded: cfg.max_loaded_segments,
            state: Mutex::new(ManagerState {
                loaded: BTreeMap::new(),
                master_index,
                min_index,
            }),
        })
    }

    fn segment_path(&self, index: u64) -> PathBuf {
        self.dir.join(segnum_to_name(index))
    }

    /// Appends `payload`, assigning it the next stream-monotonic index.
    pub fn append(&self, payload: &[u8]) -> Result<u64> {
        let mut state = self.state.lock().expect("manager lock poisoned");
        let path = self.segment_path(state.master_index);

        if !state.loaded.contains_key(&path) {
            log::debug!("opening segment {} for append", path.display());
            let segment = Segment::open_or_create(path.clone())?;
            state.loaded.insert(path.clone(), segment);
        }
        state.loaded[&path].append(state.master_index, payload)?;

        let assigned = state.master_index;
        state.master_index += 1;

        if state.loaded.len() > self.max_loaded {
            if let Some(oldest) = state.loaded.keys().next().cloned() {
                log::debug!("evicting segment {}", oldest.display());
                if let Some(segment) = state.loaded.remove(&oldest) {
                    segment.close()?;
                }
            }
        }

        Ok(assigned)
    }

    /// Reads the payload recorded at `index`.
    pub fn read(&self, index: u64) -> Result<Vec<u8>> {
        let mut state = self.state.lock().expect("manager lock poisoned");
        if index < state.min_index || index > state.master_index {
            return Err(WalError::InvalidIndex(index));
        }

        let path = self.segment_path(index);
        if let Some(segment) = state.loaded.get(&path) {
            return segment.read(index);
        }

        if !path.exists() {
            return Err(WalError::IndexDoesNotExist(index));
        }

        log::debug!("loading segment {} for read", path.display());
        let segment = Segment::open_or_create(path.clone())?;
        let result = segment.read(index);
        state.loaded.insert(path, segment);
        result
    }

    /// Removes every segment file, clearing the in-memory cache and
    /// resetting `master_index` to 0. `min_index` is left untouched.
    pub fn purge(&self) -> Result<()> {
        let mut state = self.state.lock().expect("manager lock poisoned");
        for path in sorted_segment_paths(&self.dir)? {
            let _ = fs::remove_file(&path);
            let _ = fs::remove_file(map_path(&path));
        }
        state.loaded.clear();
        state.master_index = 0;
        Ok(())
    }

    pub fn master_index(&self) -> u64 {
        self.state.lock().expect("manager lock poisoned").master_index
    }

    pub fn min_index(&self) -> u64 {
        self.state.lock().expect("manager lock poisoned").min_index
    }

    /// Paths of segments currently open in memory, for observability/tests.
    pub fn loaded_paths(&self) -> Vec<PathBuf> {
        self.state
            .lock()
            .expect("manager lock poisoned")
            .loaded
            .keys()
            .cloned()
            .collect()
    }
}

fn map_path(data_path: &Path) -> PathBuf {
    let mut os = data_path.as_os_str().to_owned();
    os.push(".map");
    PathBuf::from(os)
}
