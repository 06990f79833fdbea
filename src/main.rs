use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use tracing::info;

use sqlfs::vfs::mount::{mount_options, MountConfig};
use sqlfs::vfs::{SqlFs, SqlFuse, Store};

fn main() -> Result<()> {
    let matches = Command::new("sqlfs")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Mount a POSIX filesystem stored in a single SQLite database")
        .arg(
            Arg::new("db")
                .long("db")
                .value_name("PATH")
                .required(true)
                .help("SQLite database file backing the filesystem"),
        )
        .arg(
            Arg::new("auto_unmount")
                .long("auto-unmount")
                .action(ArgAction::SetTrue)
                .help("Automatically unmount on process exit"),
        )
        .arg(
            Arg::new("allow_root")
                .long("allow-root")
                .action(ArgAction::SetTrue)
                .help("Allow root to access the filesystem"),
        )
        .arg(
            Arg::new("MOUNT_POINT")
                .required(true)
                .index(1)
                .help("Directory to mount the filesystem at"),
        )
        .get_matches();

    tracing_subscriber::fmt::init();

    let db_path: PathBuf = matches
        .get_one::<String>("db")
        .map(PathBuf::from)
        .context("--db is required")?;
    let mountpoint: PathBuf = matches
        .get_one::<String>("MOUNT_POINT")
        .map(PathBuf::from)
        .context("mountpoint is required")?;

    let config = MountConfig {
        auto_unmount: matches.get_flag("auto_unmount"),
        allow_root: matches.get_flag("allow_root"),
    };

    let store = Store::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    let filesystem = SqlFuse::new(SqlFs::new(store));

    info!("mounting {} at {}", db_path.display(), mountpoint.display());
    fuser::mount2(filesystem, &mountpoint, &mount_options(&config))
        .with_context(|| format!("failed to mount at {}", mountpoint.display()))?;
    Ok(())
}
