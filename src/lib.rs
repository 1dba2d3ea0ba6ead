//! Append-only write-ahead log with segmented, index-addressable streams.
//!
//! A [`Wal`] owns a directory of named streams. Each stream is an
//! append-only sequence of records, persisted across a family of
//! fixed-capacity [`Segment`](segment::Segment)s (1000 records each),
//! managed by a [`SegmentManager`](segment_manager::SegmentManager) that
//! assigns indices, rolls over segments, and keeps a bounded number of
//! them open in memory.
//!
//! ```no_run
//! use walrecord::{Wal, WalConfig};
//!
//! let wal = Wal::open("./data", WalConfig::default())?;
//! let idx = wal.append("events", b"hello")?;
//! let record = wal.read("events", idx)?;
//! assert_eq!(record.payload, b"hello");
//! # Ok::<(), walrecord::WalError>(())
//! ```

pub mod config;
pub mod error;
pub mod segment;
pub mod segment_manager;
pub mod wal;

pub use config::WalConfig;
pub use error::{Result, WalError};
pub use segment_manager::segnum_to_name;
pub use wal::{Record, Wal};
