/// Core types used throughout vmsnap: the snapshot format table and the
/// error taxonomy.
use std::fmt;

use thiserror::Error;

pub use proc_maps::Pid;

/// Output formats for a vmmap snapshot. The format picks both the counter
/// key ("type key") used for sequence numbering and the file extension, so
/// the Nth snapshot of a format lands at `<type key>-<N>.<extension>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum SnapshotFormat {
    /// One region per line, vmmap-style text
    Text,
    /// Region and byte totals grouped by permission class
    Summary,
    /// JSON array of region records
    Json,
}

impl SnapshotFormat {
    pub fn type_key(self) -> &'static str {
        match self {
            SnapshotFormat::Text => "vmmap",
            SnapshotFormat::Summary => "summary",
            SnapshotFormat::Json => "regions",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Text => "vmmap",
            SnapshotFormat::Summary => "txt",
            SnapshotFormat::Json => "json",
        }
    }
}

impl fmt::Display for SnapshotFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SnapshotFormat::Text => "text",
            SnapshotFormat::Summary => "summary",
            SnapshotFormat::Json => "json",
        };
        write!(f, "{}", name)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// The snapshot output folder couldn't be resolved or created. Nothing is
    /// cached on this path, so a later call may succeed once the underlying
    /// condition (disk, permissions) clears.
    #[error("Snapshot output folder is unavailable: {0:#}")]
    Configuration(anyhow::Error),
    /// The capture facility failed after a sequence number was already
    /// claimed. The resulting gap in that type's numbering is permanent and
    /// expected; no partial output file is left behind.
    #[error("Memory map capture failed: {0:#}")]
    Capture(anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::SnapshotFormat;

    #[test]
    fn test_format_table() {
        assert_eq!(SnapshotFormat::Text.type_key(), "vmmap");
        assert_eq!(SnapshotFormat::Text.extension(), "vmmap");
        assert_eq!(SnapshotFormat::Summary.type_key(), "summary");
        assert_eq!(SnapshotFormat::Summary.extension(), "txt");
        assert_eq!(SnapshotFormat::Json.type_key(), "regions");
        assert_eq!(SnapshotFormat::Json.extension(), "json");
    }
}
