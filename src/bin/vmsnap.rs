use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use vmsnap::{Aspect, Pid, RegistryConfig, SnapshotFormat, SnapshotRegistry};

#[derive(Parser, Debug)]
#[command(name = "vmsnap", version, about = "Capture vmmap snapshots of a running process")]
struct Args {
    /// PID of the process to snapshot. Defaults to vmsnap itself, which is
    /// mostly useful for trying the tool out.
    #[arg(short, long)]
    pid: Option<Pid>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = SnapshotFormat::Text)]
    format: SnapshotFormat,

    /// Logging aspect (category) to file the snapshot under
    #[arg(short, long, default_value = "Memory")]
    aspect: String,

    /// Directory to write snapshots into. Defaults to a timestamped folder
    /// under the platform cache directory.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Number of snapshots to take
    #[arg(short, long, default_value_t = 1)]
    count: u32,
}

fn do_main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let pid = args.pid.unwrap_or(std::process::id() as Pid);

    #[cfg(unix)]
    if pid != std::process::id() as Pid && !nix::unistd::Uid::effective().is_root() {
        eprintln!(
            "Warning: snapshotting another process usually requires root. If this fails, try again with sudo."
        );
    }

    let registry = SnapshotRegistry::new(RegistryConfig {
        pid,
        output_root: args.output_dir,
        capture: None,
    });
    let aspect = Arc::new(Aspect::new(args.aspect));
    let instance = registry.snapshot_for(&aspect);
    for _ in 0..args.count {
        let path = instance.take_vmmap_snapshot(log::Level::Info, args.format)?;
        println!("{}", path.display());
    }
    Ok(())
}

fn main() {
    if let Err(err) = do_main() {
        eprintln!("Error. Causes: ");
        for cause in err.chain() {
            eprintln!("- {}", cause);
        }
        std::process::exit(1);
    }
}

#[test]
fn test_arg_parsing() {
    let args = Args::try_parse_from(vec!["vmsnap", "--pid", "1234"]).unwrap();
    assert_eq!(args.pid, Some(1234));
    assert_eq!(args.format, SnapshotFormat::Text);
    assert_eq!(args.aspect, "Memory");
    assert_eq!(args.count, 1);

    let args = Args::try_parse_from(vec![
        "vmsnap", "-p", "1234", "-f", "json", "-a", "Graphics", "-c", "3",
    ])
    .unwrap();
    assert_eq!(args.pid, Some(1234));
    assert_eq!(args.format, SnapshotFormat::Json);
    assert_eq!(args.aspect, "Graphics");
    assert_eq!(args.count, 3);

    assert!(Args::try_parse_from(vec!["vmsnap", "--format", "exotic"]).is_err());
}
