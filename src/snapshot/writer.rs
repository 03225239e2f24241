use std::fs;
use std::path::PathBuf;

use anyhow::Context;

use super::SnapshotInstance;
use crate::core::types::{Error, SnapshotFormat};

/// Runs one capture: resolve the output location, claim a sequence number,
/// invoke the capture facility, then log where the file went.
///
/// Folder resolution happens before the sequence number is claimed, so a
/// configuration failure never consumes a number. Sequence acquisition and
/// the capture are two separable steps; the increment lock is released
/// before any I/O happens, so a slow capture never blocks other threads
/// from claiming numbers.
pub(crate) fn take_vmmap_snapshot(
    instance: &SnapshotInstance,
    level: log::Level,
    format: SnapshotFormat,
) -> Result<PathBuf, Error> {
    let shared = instance.shared();
    let base = shared.base_output_folder()?;
    let aspect_dir = base.join(instance.aspect().name());
    fs::create_dir_all(&aspect_dir)
        .context(format!(
            "Failed to create snapshot directory {}",
            aspect_dir.display()
        ))
        .map_err(Error::Configuration)?;

    let type_key = format.type_key();
    let seq = instance.counter().next_sequence(type_key);
    let out_path = aspect_dir.join(format!("{}-{}.{}", type_key, seq, format.extension()));

    shared
        .capture()
        .capture(shared.pid(), format, &out_path)
        .map_err(Error::Capture)?;

    log!(
        target: instance.aspect().name(),
        level,
        "vmmap snapshot ({}) written to {}",
        type_key,
        out_path.display()
    );
    Ok(out_path)
}
