use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use proc_maps::{get_process_maps, MapRange};
use serde_derive::Serialize;
use tempfile::NamedTempFile;

use crate::core::types::{Pid, SnapshotFormat};

/// The seam to the external memory-map capture facility.
///
/// Implementations must either fully write `out_path` or fail without
/// leaving anything there; callers rely on never seeing a partial snapshot.
/// The call may block for as long as the underlying OS facility takes.
pub trait Capture: Send + Sync {
    fn capture(&self, pid: Pid, format: SnapshotFormat, out_path: &Path) -> Result<()>;
}

/// One memory region of the target process, as written into snapshot files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionRecord {
    pub start: usize,
    pub size: usize,
    pub read: bool,
    pub write: bool,
    pub exec: bool,
    pub path: Option<String>,
}

impl From<&MapRange> for RegionRecord {
    fn from(range: &MapRange) -> RegionRecord {
        RegionRecord {
            start: range.start(),
            size: range.size(),
            read: range.is_read(),
            write: range.is_write(),
            exec: range.is_exec(),
            path: range
                .filename()
                .map(|p| p.to_string_lossy().into_owned()),
        }
    }
}

impl RegionRecord {
    fn permissions(&self) -> String {
        format!(
            "{}{}{}",
            if self.read { 'r' } else { '-' },
            if self.write { 'w' } else { '-' },
            if self.exec { 'x' } else { '-' }
        )
    }
}

/// Captures by walking the target's memory regions with the proc-maps crate.
/// Works for the current process without elevated privileges on Linux;
/// snapshotting other processes generally requires root.
pub struct ProcMapsCapture;

impl Capture for ProcMapsCapture {
    fn capture(&self, pid: Pid, format: SnapshotFormat, out_path: &Path) -> Result<()> {
        let maps = get_process_maps(pid)
            .context(format!("Failed to read memory maps for PID {}", pid))?;
        let regions: Vec<RegionRecord> = maps.iter().map(RegionRecord::from).collect();
        debug!("captured {} regions for PID {}", regions.len(), pid);

        write_atomically(out_path, |file| match format {
            SnapshotFormat::Text => write_text(file, &regions),
            SnapshotFormat::Summary => write_summary(file, &regions),
            SnapshotFormat::Json => {
                serde_json::to_writer_pretty(file, &regions)?;
                Ok(())
            }
        })
    }
}

/// Shells out to the vmmap(1) tool that ships with the macOS developer
/// tools. JSON output isn't something the tool speaks, so that format is
/// delegated to the proc-maps walker.
#[cfg(target_os = "macos")]
pub struct VmmapToolCapture;

#[cfg(target_os = "macos")]
impl Capture for VmmapToolCapture {
    fn capture(&self, pid: Pid, format: SnapshotFormat, out_path: &Path) -> Result<()> {
        if format == SnapshotFormat::Json {
            return ProcMapsCapture.capture(pid, format, out_path);
        }

        let mut command = std::process::Command::new("vmmap");
        if format == SnapshotFormat::Summary {
            command.arg("-summary");
        }
        let output = command
            .arg(pid.to_string())
            .output()
            .context("Failed to run vmmap. Are the Xcode command line tools installed?")?;
        if !output.status.success() {
            anyhow::bail!(
                "vmmap exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        write_atomically(out_path, |file| {
            file.write_all(&output.stdout)?;
            Ok(())
        })
    }
}

/// The default backend: the vmmap tool on macOS, the proc-maps walker
/// everywhere else.
pub fn default_capture() -> Box<dyn Capture> {
    #[cfg(target_os = "macos")]
    {
        Box::new(VmmapToolCapture)
    }
    #[cfg(not(target_os = "macos"))]
    {
        Box::new(ProcMapsCapture)
    }
}

// Writes through a temp file in the destination directory and persists it
// only once the writer closure succeeds, so a failure part-way through never
// leaves a truncated snapshot at the final path.
fn write_atomically<F>(out_path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut std::fs::File) -> Result<()>,
{
    let dir = out_path
        .parent()
        .context("Snapshot output path has no parent directory")?;
    let mut file = NamedTempFile::new_in(dir)
        .context(format!("Failed to create temp file in {}", dir.display()))?;
    write(file.as_file_mut())?;
    file.persist(out_path)
        .context(format!("Failed to persist snapshot to {}", out_path.display()))?;
    Ok(())
}

fn write_text(w: &mut impl Write, regions: &[RegionRecord]) -> Result<()> {
    for region in regions {
        writeln!(
            w,
            "{:016x}-{:016x} {} {:>12} {}",
            region.start,
            region.start + region.size,
            region.permissions(),
            region.size,
            region.path.as_deref().unwrap_or("")
        )?;
    }
    Ok(())
}

fn write_summary(w: &mut impl Write, regions: &[RegionRecord]) -> Result<()> {
    let mut by_permissions: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for region in regions {
        let entry = by_permissions.entry(region.permissions()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += region.size;
    }
    writeln!(w, "{:<5} {:>8} {:>16}", "PERM", "REGIONS", "BYTES")?;
    for (permissions, (count, bytes)) in &by_permissions {
        writeln!(w, "{:<5} {:>8} {:>16}", permissions, count, bytes)?;
    }
    writeln!(
        w,
        "{:<5} {:>8} {:>16}",
        "TOTAL",
        regions.len(),
        regions.iter().map(|r| r.size).sum::<usize>()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    lazy_static! {
        static ref REGIONS: Vec<RegionRecord> = vec![
            RegionRecord {
                start: 0x400000,
                size: 0x1000,
                read: true,
                write: false,
                exec: true,
                path: Some("/usr/bin/fish".to_string()),
            },
            RegionRecord {
                start: 0x600000,
                size: 0x2000,
                read: true,
                write: true,
                exec: false,
                path: Some("[heap]".to_string()),
            },
            RegionRecord {
                start: 0x700000,
                size: 0x3000,
                read: true,
                write: true,
                exec: false,
                path: None,
            },
        ];
    }

    #[test]
    fn test_write_text() {
        let mut out = Vec::new();
        write_text(&mut out, &REGIONS).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("0000000000400000-0000000000401000 r-x"));
        assert!(lines[0].ends_with("/usr/bin/fish"));
        assert!(lines[1].contains("rw-"));
        assert!(lines[1].contains("[heap]"));
    }

    #[test]
    fn test_write_summary() {
        let mut out = Vec::new();
        write_summary(&mut out, &REGIONS).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("PERM"));
        // two rw- regions totalling 0x5000 bytes
        assert!(text.contains("rw-"));
        let rw_line = text.lines().find(|l| l.starts_with("rw-")).unwrap();
        assert!(rw_line.contains('2'));
        assert!(rw_line.contains("20480"));
        let total_line = text.lines().find(|l| l.starts_with("TOTAL")).unwrap();
        assert!(total_line.contains('3'));
        assert!(total_line.contains("24576"));
    }

    #[test]
    fn test_json_roundtrip_keys() {
        let json = serde_json::to_string(&*REGIONS).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 3);
        assert_eq!(value[0]["start"], 0x400000);
        assert_eq!(value[0]["exec"], true);
        assert_eq!(value[2]["path"], serde_json::Value::Null);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_proc_maps_capture_own_process() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("vmmap-1.vmmap");
        let pid = std::process::id() as Pid;
        ProcMapsCapture
            .capture(pid, SnapshotFormat::Text, &out_path)
            .unwrap();
        let contents = std::fs::read_to_string(&out_path).unwrap();
        assert!(!contents.is_empty());
    }

    #[test]
    fn test_failed_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("vmmap-1.vmmap");
        let result = write_atomically(&out_path, |_| anyhow::bail!("capture facility fell over"));
        assert!(result.is_err());
        assert!(!out_path.exists());
    }
}
