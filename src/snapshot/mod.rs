pub mod counter;
mod writer;

pub use counter::SnapshotCounter;

use std::path::PathBuf;
use std::sync::Arc;

use crate::core::aspect::Aspect;
use crate::core::types::{Error, SnapshotFormat};
use crate::registry::Shared;

/// Per-aspect snapshot taker. At most one instance exists per aspect per
/// registry; get one with `SnapshotRegistry::snapshot_for`. Instances live as
/// long as the registry, so sequence numbers stay monotonic for the life of
/// the process.
pub struct SnapshotInstance {
    aspect: Arc<Aspect>,
    counter: SnapshotCounter,
    shared: Arc<Shared>,
}

impl SnapshotInstance {
    pub(crate) fn new(aspect: Arc<Aspect>, shared: Arc<Shared>) -> SnapshotInstance {
        SnapshotInstance {
            aspect,
            counter: SnapshotCounter::new(),
            shared,
        }
    }

    pub fn aspect(&self) -> &Arc<Aspect> {
        &self.aspect
    }

    /// Captures a vmmap snapshot of the registry's target process, writes it
    /// under `base/<aspect>/<type key>-<seq>.<ext>` and logs the location at
    /// `level` on this instance's aspect. Blocks for the duration of the
    /// capture; keep it off latency-sensitive paths.
    ///
    /// The sequence number is claimed before the capture runs and is never
    /// rolled back, so a failed capture leaves a gap in that type's
    /// numbering. Errors surface to the caller and are not logged here.
    pub fn take_vmmap_snapshot(
        &self,
        level: log::Level,
        format: SnapshotFormat,
    ) -> Result<PathBuf, Error> {
        writer::take_vmmap_snapshot(self, level, format)
    }

    pub(crate) fn counter(&self) -> &SnapshotCounter {
        &self.counter
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }
}
