//! Dump and restore configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::format::{COPY_BUFFER_SIZE, MIN_COPY_BUFFER_SIZE};

/// Dump writer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    /// Buffer size for copying staged chunks into the dump (default: 10MB).
    ///
    /// Affects I/O granularity and peak memory only, never the file format.
    pub copy_buffer_size: usize,

    /// Directory for the chunk scratch file (default: system temp dir).
    pub staging_dir: Option<PathBuf>,

    /// Write to `<name>.tmp`, fsync, then rename into place (default: true).
    pub atomic_output: bool,

    /// Largest accepted chunk in bytes (default: `u32::MAX`).
    ///
    /// Each chunk becomes one data segment with a u32 length.
    pub max_chunk_size: u64,
}

impl Default for DumpConfig {
    fn default() -> Self {
        DumpConfig {
            copy_buffer_size: COPY_BUFFER_SIZE,
            staging_dir: None,
            atomic_output: true,
            max_chunk_size: u64::from(u32::MAX),
        }
    }
}

impl DumpConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set copy buffer size (builder pattern).
    pub fn with_copy_buffer_size(mut self, size: usize) -> Self {
        self.copy_buffer_size = size;
        self
    }

    /// Set staging directory (builder pattern).
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    /// Enable or disable temp-file-and-rename output (builder pattern).
    pub fn with_atomic_output(mut self, atomic: bool) -> Self {
        self.atomic_output = atomic;
        self
    }

    /// Set maximum chunk size (builder pattern).
    pub fn with_max_chunk_size(mut self, size: u64) -> Self {
        self.max_chunk_size = size;
        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.copy_buffer_size < MIN_COPY_BUFFER_SIZE {
            return Err(ConfigError::CopyBufferTooSmall {
                size: self.copy_buffer_size,
                min: MIN_COPY_BUFFER_SIZE,
            });
        }
        if self.max_chunk_size == 0 || self.max_chunk_size > u64::from(u32::MAX) {
            return Err(ConfigError::MaxChunkSizeOutOfRange {
                size: self.max_chunk_size,
            });
        }
        if let Some(dir) = &self.staging_dir {
            if !dir.is_dir() {
                return Err(ConfigError::StagingDirNotFound { path: dir.clone() });
            }
        }
        Ok(())
    }

    /// Create a configuration for testing (small copy buffer).
    pub fn for_testing() -> Self {
        DumpConfig {
            copy_buffer_size: MIN_COPY_BUFFER_SIZE,
            ..Default::default()
        }
    }
}

/// Dump reader configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// Decode the header and check every data segment against its chunk
    /// table (default: false).
    pub verify_header_table: bool,
}

impl RestoreConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable chunk table checks (builder pattern).
    pub fn with_verify_header_table(mut self, verify: bool) -> Self {
        self.verify_header_table = verify;
        self
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Copy buffer is below the minimum.
    #[error("Copy buffer size {size} is below the minimum of {min} bytes")]
    CopyBufferTooSmall {
        /// Configured size
        size: usize,
        /// Minimum size
        min: usize,
    },

    /// Chunk limit is zero or does not fit a u32 length.
    #[error("Maximum chunk size {size} must be between 1 and 4294967295")]
    MaxChunkSizeOutOfRange {
        /// Configured size
        size: u64,
    },

    /// Staging directory does not exist.
    #[error("Staging directory {} does not exist", .path.display())]
    StagingDirNotFound {
        /// Configured directory
        path: PathBuf,
    },
}
