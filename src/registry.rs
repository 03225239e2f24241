use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::prelude::*;

use crate::capture::{default_capture, Capture};
use crate::core::aspect::Aspect;
use crate::core::types::{Error, Pid, SnapshotFormat};
use crate::snapshot::SnapshotInstance;

/// Configuration for a snapshot registry.
pub struct RegistryConfig {
    /// The process whose memory map gets captured. Default: this process.
    pub pid: Pid,
    /// Root folder for snapshot output, used as-is (created if missing). If
    /// `None`, a timestamped folder under the platform cache directory is
    /// resolved lazily on first use.
    pub output_root: Option<PathBuf>,
    /// The capture backend. Default: the vmmap tool on macOS, the proc-maps
    /// walker elsewhere.
    pub capture: Option<Box<dyn Capture>>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            pid: std::process::id() as Pid,
            output_root: None,
            capture: None,
        }
    }
}

/// State shared by every snapshot instance created by one registry: the
/// target pid, the capture backend, and the lazily-resolved output folder.
pub(crate) struct Shared {
    pid: Pid,
    output_root: Option<PathBuf>,
    capture: Box<dyn Capture>,
    resolved_output: Mutex<Option<PathBuf>>,
}

impl Shared {
    pub(crate) fn pid(&self) -> Pid {
        self.pid
    }

    pub(crate) fn capture(&self) -> &dyn Capture {
        self.capture.as_ref()
    }

    // Resolved at most once per registry. A failed resolution caches
    // nothing, so the next call retries after the underlying condition
    // (disk, permissions) clears.
    pub(crate) fn base_output_folder(&self) -> Result<PathBuf, Error> {
        let mut resolved = self.resolved_output.lock().unwrap();
        if let Some(path) = resolved.as_ref() {
            return Ok(path.clone());
        }
        let path =
            resolve_output_folder(self.output_root.as_deref()).map_err(Error::Configuration)?;
        debug!("resolved snapshot output folder {}", path.display());
        *resolved = Some(path.clone());
        Ok(path)
    }
}

fn resolve_output_folder(root: Option<&Path>) -> Result<PathBuf> {
    let folder = match root {
        Some(root) => root.to_path_buf(),
        None => directories::ProjectDirs::from("", "", "vmsnap")
            .ok_or_else(|| anyhow!("Couldn't determine a cache directory for this platform"))?
            .cache_dir()
            .join("snapshots")
            .join(format!("vmsnap-{}", Utc::now().to_rfc3339())),
    };
    fs::create_dir_all(&folder).context(format!(
        "Failed to create snapshot folder {}",
        folder.display()
    ))?;
    Ok(folder)
}

/// Process-wide registry handing out one `SnapshotInstance` per aspect.
///
/// Create one at startup, share it (it's `Sync`), and let it live until
/// process exit; tearing it down earlier just resets sequence numbering.
pub struct SnapshotRegistry {
    shared: Arc<Shared>,
    instances: Mutex<HashMap<String, Arc<SnapshotInstance>>>,
}

impl SnapshotRegistry {
    pub fn new(config: RegistryConfig) -> SnapshotRegistry {
        let capture = config.capture.unwrap_or_else(default_capture);
        SnapshotRegistry {
            shared: Arc::new(Shared {
                pid: config.pid,
                output_root: config.output_root,
                capture,
                resolved_output: Mutex::new(None),
            }),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the instance for `aspect`, creating it on first use. Lookup
    /// and insert happen under one short-lived lock, so racing callers for
    /// the same aspect always get the same instance, and callers for
    /// different aspects only contend on the map operation, never on capture
    /// I/O.
    pub fn snapshot_for(&self, aspect: &Arc<Aspect>) -> Arc<SnapshotInstance> {
        let mut instances = self.instances.lock().unwrap();
        instances
            .entry(aspect.name().to_string())
            .or_insert_with(|| {
                debug!("creating snapshot instance for aspect {}", aspect.name());
                Arc::new(SnapshotInstance::new(aspect.clone(), self.shared.clone()))
            })
            .clone()
    }

    /// The root folder snapshot files are written under, resolving and
    /// caching it if this is the first use.
    pub fn base_output_folder(&self) -> Result<PathBuf, Error> {
        self.shared.base_output_folder()
    }

    /// Takes one snapshot on the instance belonging to `aspect`. This is the
    /// whole public flow in one call; hold on to the instance from
    /// `snapshot_for` instead if you're taking many.
    pub fn take_snapshot(
        &self,
        aspect: &Arc<Aspect>,
        level: log::Level,
        format: SnapshotFormat,
    ) -> Result<PathBuf, Error> {
        self.snapshot_for(aspect).take_vmmap_snapshot(level, format)
    }
}
