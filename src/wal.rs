//! Façade mapping stream names to their [`SegmentManager`], with lazy
//! creation and directory bootstrap.
//!
//! This is the thin external collaborator described by the storage
//! engine's spec: it owns no on-disk format knowledge of its own, it just
//! routes by stream name.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::{self, WalConfig};
use crate::error::Result;
use crate::segment_manager::SegmentManager;

/// A single record read back from a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub index: u64,
    pub payload: Vec<u8>,
}

/// Top-level handle onto a directory of streams.
///
/// Each stream is a subdirectory of `root`; streams are independent of one
/// another and are only created (in memory) on first use.
pub struct Wal {
    root: PathBuf,
    config: WalConfig,
    streams: Mutex<HashMap<String, Arc<SegmentManager>>>,
}

impl Wal {
    /// Opens (or creates) the WAL root directory and recovers any streams
    /// already present as subdirectories.
    pub fn open(root: impl Into<PathBuf>, config: WalConfig) -> Result<Self> {
        let root = root.into();
        if !root.exists() {
            config::create_dir(&root, config.dir_mode)?;
        }

        let mut streams = HashMap::new();
        for name in Self::subdirectory_names(&root)? {
            let manager = SegmentManager::open(root.join(&name), config)?;
            streams.insert(name, Arc::new(manager));
        }

        Ok(Self {
            root,
            config,
            streams: Mutex::new(streams),
        })
    }

    fn subdirectory_names(root: &std::path::Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Returns the names of every stream currently known, including those
    /// that have not yet been written to in this process but exist on disk.
    pub fn list_streams(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .streams
            .lock()
            .expect("wal lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    fn stream(&self, name: &str) -> Result<Arc<SegmentManager>> {
        let mut streams = self.streams.lock().expect("wal lock poisoned");
        if let Some(manager) = streams.get(name) {
            return Ok(Arc::clone(manager));
        }
        let manager = Arc::new(SegmentManager::open(self.root.join(name), self.config)?);
        streams.insert(name.to_string(), Arc::clone(&manager));
        Ok(manager)
    }

    /// Appends `payload` to `stream`, creating the stream if necessary.
    pub fn append(&self, stream: &str, payload: &[u8]) -> Result<u64> {
        self.stream(stream)?.append(payload)
    }

    /// Reads a single record by index.
    pub fn read(&self, stream: &str, index: u64) -> Result<Record> {
        let payload = self.stream(stream)?.read(index)?;
        Ok(Record { index, payload })
    }

    /// Reads every record with index `>= start`, stopping at the first
    /// gap. Both `InvalidIndex` (index never assigned) and
    /// `IndexDoesNotExist` (assigned, but the segment that would hold it
    /// hasn't rolled into existence yet — the boundary case at an exact
    /// multiple of 1000) are treated as end-of-stream. Any other error is
    /// propagated.
    pub fn read_from(&self, stream: &str, start: u64) -> Result<Vec<Record>> {
        let manager = self.stream(stream)?;
        let mut records = Vec::new();
        let mut index = start;
        loop {
            match manager.read(index) {
                Ok(payload) => {
                    records.push(Record { index, payload });
                    index += 1;
                }
                Err(crate::error::WalError::InvalidIndex(_)) => break,
                Err(crate::error::WalError::IndexDoesNotExist(_)) => break,
                Err(err) => return Err(err),
            }
        }
        Ok(records)
    }

    /// Wholesale-deletes every segment of `stream`, creating it first if
    /// it did not already exist.
    pub fn purge_stream(&self, stream: &str) -> Result<()> {
        self.stream(stream)?.purge()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cfg() -> WalConfig {
        WalConfig::new(4).with_dir_mode(0o777)
    }

    #[test]
    fn empty_round_trip() {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path(), cfg()).unwrap();

        assert_eq!(wal.list_streams().unwrap(), Vec::<String>::new());

        assert_eq!(wal.append("first", b"test").unwrap(), 0);
        assert_eq!(wal.append("first", b"second").unwrap(), 1);

        assert_eq!(wal.list_streams().unwrap(), vec!["first".to_string()]);
        assert_eq!(wal.read("first", 0).unwrap().payload, b"test");

        let records = wal.read_from("first", 0).unwrap();
        assert_eq!(
            records,
            vec![
                Record { index: 0, payload: b"test".to_vec() },
                Record { index: 1, payload: b"second".to_vec() },
            ]
        );
    }

    #[test]
    fn different_streams_are_independent() {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path(), cfg()).unwrap();

        assert_eq!(wal.append("a", b"1").unwrap(), 0);
        assert_eq!(wal.append("b", b"1").unwrap(), 0);
        assert_eq!(wal.append("a", b"2").unwrap(), 1);

        assert_eq!(wal.read("a", 1).unwrap().payload, b"2");
        assert_eq!(wal.read("b", 0).unwrap().payload, b"1");
    }

    #[test]
    fn read_from_stops_at_first_hole() {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path(), cfg()).unwrap();
        wal.append("s", b"a").unwrap();
        wal.append("s", b"b").unwrap();

        assert_eq!(wal.read_from("s", 2).unwrap(), Vec::new());
    }

    #[test]
    fn read_from_at_exact_segment_boundary_returns_all_records() {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path(), cfg()).unwrap();
        for _ in 0..1000 {
            wal.append("s", b"x").unwrap();
        }

        assert_eq!(wal.read_from("s", 0).unwrap().len(), 1000);
    }

    #[test]
    fn purge_stream_then_reopen_starts_fresh() {
        let dir = tempdir().unwrap();
        let wal = Wal::open(dir.path(), cfg()).unwrap();
        wal.append("s", b"a").unwrap();
        wal.append("s", b"b").unwrap();

        wal.purge_stream("s").unwrap();
        assert_eq!(wal.append("s", b"c").unwrap(), 0);
    }
}
