//! Mount option assembly.

use fuser::MountOption;

/// Options for mounting the filesystem at a directory.
#[derive(Debug, Clone, Default)]
pub struct MountConfig {
    /// Automatically unmount on process exit
    pub auto_unmount: bool,

    /// Allow root to access the filesystem
    pub allow_root: bool,
}

/// Build the option list handed to the kernel at mount time.
pub fn mount_options(config: &MountConfig) -> Vec<MountOption> {
    let mut options = vec![MountOption::RW, MountOption::FSName("sqlfs".to_string())];

    if config.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }
    if config.allow_root {
        options.push(MountOption::AllowRoot);
    }

    options
}
