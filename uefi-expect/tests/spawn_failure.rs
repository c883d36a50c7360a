//! Failed spawns release both ends of the pseudo-terminal.
//!
//! Kept in its own test binary so no other test opens descriptors while
//! they are being counted.

use std::fs;

use uefi_expect::Error;
use uefi_expect::driver::SessionBuilder;
use uefi_expect::error::SpawnError;

fn open_fds() -> usize {
    fs::read_dir("/proc/self/fd").unwrap().count()
}

#[tokio::test]
async fn test_failed_spawn_leaks_no_descriptors() {
    // Let the runtime set up its child-reaping machinery first.
    let mut warmup = SessionBuilder::new(["true"]).spawn().unwrap();
    warmup.close().await.unwrap();
    drop(warmup);

    let before = open_fds();
    for _ in 0..8 {
        let err = SessionBuilder::new(["/nonexistent/qemu-system-x86_64", "-nodefaults"])
            .spawn()
            .unwrap_err();
        assert!(matches!(err, Error::Spawn(SpawnError::Exec { .. })));
    }
    assert_eq!(open_fds(), before);
}
