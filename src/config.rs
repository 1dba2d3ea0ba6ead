/// Configuration threaded through directory and stream construction.
///
/// Replaces the process-wide "running in test" flag of the original
/// implementation with an explicit value the caller controls.
#[derive(Debug, Clone, Copy)]
pub struct WalConfig {
    /// Maximum number of segments kept open per stream at steady state.
    pub max_loaded_segments: usize,
    /// Permission mode used when creating stream and root directories.
    ///
    /// Unix-only; ignored on other platforms. The original production
    /// default (`0o660`) has no execute bit and is not traversable — see
    /// the crate-level docs for why that default is preserved here rather
    /// than silently "fixed".
    pub dir_mode: u32,
}

impl WalConfig {
    /// `max_loaded_segments` with the original's production directory mode.
    pub fn new(max_loaded_segments: usize) -> Self {
        Self {
            max_loaded_segments,
            dir_mode: 0o660,
        }
    }

    pub fn with_dir_mode(mut self, dir_mode: u32) -> Self {
        self.dir_mode = dir_mode;
        self
    }
}

impl Default for WalConfig {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(unix)]
pub(crate) fn create_dir(path: &std::path::Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .mode(mode)
        .create(path)
        .or_else(|err| {
            if err.kind() == std::io::ErrorKind::AlreadyExists {
                Ok(())
            } else {
                Err(err)
            }
        })
}

#[cfg(not(unix))]
pub(crate) fn create_dir(path: &std::path::Path, _mode: u32) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}
