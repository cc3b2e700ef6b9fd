//! Shared setup for the integration tests

use std::sync::Arc;

use ::common::mount::{MountController, Superblock, FS_NAME};

/// Mount a fresh instance with the given option string
pub fn setup_test_mount(data: &str) -> (MountController, Arc<Superblock>) {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("common=debug")
        .try_init();

    let controller = MountController::new();
    let sb = controller
        .mount(FS_NAME, "none", data)
        .expect("mount should succeed");
    (controller, sb)
}

/// Read the whole counter text through one handle, `chunk` bytes at a time
pub fn read_all(handle: &mut ::common::CounterHandle, chunk: usize) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let n = handle.read(&mut out, chunk).expect("read should succeed");
        if n == 0 {
            return out;
        }
    }
}
