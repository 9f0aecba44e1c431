//! Mounts a COLA filesystem backing file at a mountpoint via FUSE.
//!
//! Usage: `colafs <backing-file> <mountpoint>`
//!
//! The backing file is created (and zero-initialized) if it doesn't
//! already exist; an existing one is mounted as-is.

mod bridge;
mod inode;

use std::process::ExitCode;

use colafs_fs::ColaFs;
use fuser::MountOption;

use bridge::Bridge;

fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (Some(backing_path), Some(mountpoint)) = (args.next(), args.next()) else {
        eprintln!("usage: colafs <backing-file> <mountpoint>");
        return ExitCode::FAILURE;
    };

    // Block size for freshly created backing files; existing files keep
    // whatever layout they were created with regardless of the host's
    // current page size.
    let block_size = page_size::get() as u64;

    let store = match colafs_store::std_fs::open_or_create(backing_path.as_ref(), block_size) {
        Ok(store) => store,
        Err(e) => {
            log::error!("failed to open backing file {backing_path:?}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let fs = Bridge::new(ColaFs::new(store));
    let options = [MountOption::FSName("colafs".to_string()), MountOption::DefaultPermissions];

    if let Err(e) = fuser::mount2(fs, &mountpoint, &options) {
        log::error!("mount on {mountpoint:?} failed: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
