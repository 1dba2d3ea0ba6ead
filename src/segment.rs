//! On-disk segment: a `.dat` file of concatenated record payloads plus a
//! `.dat.map` sidecar index of `"{index}|{size}\n"` lines in append order.
//!
//! A segment holds up to 1000 records for a contiguous range of indices.
//! Offsets are never persisted — they are reconstructed from the map file
//! by cumulative sum of sizes when a segment is loaded from disk.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Result, WalError};

/// In-memory state guarded by the segment's local lock.
struct SegmentState {
    lookup: HashMap<u64, (u64, u16)>,
    cache: Vec<u8>,
    current_offset: u64,
    data_writer: BufWriter<File>,
    map_writer: BufWriter<File>,
}

/// A single data+map file pair covering a contiguous range of 1000 indices.
pub struct Segment {
    name: PathBuf,
    state: Mutex<SegmentState>,
}

/// Path of the map sidecar for a given data file path: `<name>.map`.
fn map_path(name: &Path) -> PathBuf {
    let mut os = name.as_os_str().to_owned();
    os.push(".map");
    PathBuf::from(os)
}

fn append_writer(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().append(true).create(true).open(path)
}

/// Parses a single map-file line of the form `"{index}|{size}\n"`.
///
/// A malformed field yields `0` for that field rather than an error,
/// matching the original implementation's tolerant `ParseUint` behavior.
fn parse_map_line(line: &str) -> (u64, u16) {
    let mut parts = line.splitn(2, '|');
    let idx = parts
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);
    let size = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(0);
    (idx, size)
}

impl Segment {
    /// Opens an existing segment or creates an empty one at `name`.
    pub fn open_or_create(name: PathBuf) -> Result<Self> {
        if name.exists() {
            log::debug!("loading existing segment {}", name.display());
            Self::load(name)
        } else {
            log::debug!("creating new segment {}", name.display());
            let data_writer = BufWriter::new(append_writer(&name)?);
            let map_writer = BufWriter::new(append_writer(&map_path(&name))?);
            Ok(Self {
                name,
                state: Mutex::new(SegmentState {
                    lookup: HashMap::new(),
                    cache: Vec::new(),
                    current_offset: 0,
                    data_writer,
                    map_writer,
                }),
            })
        }
    }

    /// Loads a segment that already exists on disk, reconstructing its
    /// lookup table from the map file by cumulative sum of sizes.
    fn load(name: PathBuf) -> Result<Self> {
        let mut cache = Vec::new();
        File::open(&name)?.read_to_end(&mut cache)?;

        let data_writer = BufWriter::new(append_writer(&name)?);
        let map_writer = BufWriter::new(append_writer(&map_path(&name))?);

        let mut lookup = HashMap::new();
        let mut offset: u64 = 0;
        if let Ok(map_file) = File::open(map_path(&name)) {
            for line in BufReader::new(map_file).lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(_) => break,
                };
                if line.is_empty() {
                    continue;
                }
                let (idx, size) = parse_map_line(&line);
                lookup.insert(idx, (offset, size));
                offset += size as u64;
            }
        }

        Ok(Self {
            name,
            state: Mutex::new(SegmentState {
                lookup,
                cache,
                current_offset: offset,
                data_writer,
                map_writer,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.name
    }

    /// Appends `payload` under `index`. Does not enforce monotonicity of
    /// `index` — that is the `SegmentManager`'s responsibility.
    pub fn append(&self, index: u64, payload: &[u8]) -> Result<()> {
        if payload.len() > u16::MAX as usize {
            return Err(WalError::PayloadTooLarge(payload.len()));
        }
        let size = payload.len() as u16;

        let mut state = self.state.lock().expect("segment lock poisoned");

        state.data_writer.write_all(payload)?;
        state.data_writer.flush()?;

        state.cache.extend_from_slice(payload);

        writeln!(state.map_writer, "{index}|{size}")?;
        state.map_writer.flush()?;

        let offset = state.current_offset;
        state.lookup.insert(index, (offset, size));
        state.current_offset += size as u64;

        Ok(())
    }

    /// Returns an owned copy of the payload recorded under `index`.
    pub fn read(&self, index: u64) -> Result<Vec<u8>> {
        let state = self.state.lock().expect("segment lock poisoned");
        let (offset, size) = *state
            .lookup
            .get(&index)
            .ok_or(WalError::InvalidIndex(index))?;
        let start = offset as usize;
        let end = start + size as usize;
        Ok(state.cache[start..end].to_vec())
    }

    /// Flushes both writers. Callers must not call this more than once.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock().expect("segment lock poisoned");
        state.data_writer.flush()?;
        state.map_writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_then_read_same_segment() {
        let dir = tempdir().unwrap();
        let seg = Segment::open_or_create(dir.path().join("00000000000000000.dat")).unwrap();

        seg.append(0, b"abc").unwrap();
        seg.append(1, b"xyz").unwrap();

        assert_eq!(seg.read(0).unwrap(), b"abc");
        assert_eq!(seg.read(1).unwrap(), b"xyz");
    }

    #[test]
    fn read_missing_index_is_invalid() {
        let dir = tempdir().unwrap();
        let seg = Segment::open_or_create(dir.path().join("00000000000000000.dat")).unwrap();
        seg.append(0, b"abc").unwrap();

        match seg.read(5) {
            Err(WalError::InvalidIndex(5)) => {}
            other => panic!("expected InvalidIndex(5), got {other:?}"),
        }
    }

    #[test]
    fn reload_from_disk_reconstructs_lookup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("00000000000000000.dat");

        {
            let seg = Segment::open_or_create(path.clone()).unwrap();
            seg.append(0, b"abc").unwrap();
            seg.append(1, b"xyz").unwrap();
            seg.close().unwrap();
        }

        let reloaded = Segment::open_or_create(path.clone()).unwrap();
        assert_eq!(reloaded.read(0).unwrap(), b"abc");
        assert_eq!(reloaded.read(1).unwrap(), b"xyz");

        reloaded.append(2, b"foo").unwrap();
        reloaded.close().unwrap();

        let reloaded_again = Segment::open_or_create(path).unwrap();
        assert_eq!(reloaded_again.read(2).unwrap(), b"foo");
    }

    #[test]
    fn payload_over_u16_max_is_rejected() {
        let dir = tempdir().unwrap();
        let seg = Segment::open_or_create(dir.path().join("00000000000000000.dat")).unwrap();
        let huge = vec![0u8; u16::MAX as usize + 1];
        match seg.append(0, &huge) {
            Err(WalError::PayloadTooLarge(_)) => {}
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn malformed_map_line_parses_to_zero() {
        assert_eq!(parse_map_line("7|42"), (7, 42));
        assert_eq!(parse_map_line("not-a-number|42"), (0, 42));
        assert_eq!(parse_map_line("7|not-a-number"), (7, 0));
    }
}
