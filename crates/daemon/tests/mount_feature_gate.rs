//! Emit a warning when FUSE-dependent tests are skipped.
//!
//! The FUSE adapter tests live in `counter_fs.rs` and are gated behind
//! `#[cfg(feature = "fuse")]`. This companion file ensures a visible message
//! is emitted when running `cargo test` without the `fuse` feature, so the
//! missing coverage is not silently hidden.

#[cfg(not(feature = "fuse"))]
#[test]
fn fuse_tests_skipped_warning() {
    eprintln!(
        "\n\x1b[33mwarning\x1b[0m: Skipping FUSE adapter tests: built without `fuse` feature.\n\
         To run them, build with: cargo test --features fuse\n"
    );
}

#[test]
fn build_info_reports_features() {
    let info = pikaqfs::build_info();
    assert_eq!(info.features.contains(&"fuse"), cfg!(feature = "fuse"));
    assert!(info.to_string().starts_with("pikaqfs "));
}
