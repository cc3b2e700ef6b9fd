pub mod init;
#[cfg(feature = "fuse")]
pub mod mount;
pub mod tree;
pub mod version;

pub use init::Init;
#[cfg(feature = "fuse")]
pub use mount::Mount;
pub use tree::Tree;
pub use version::Version;

#[cfg(feature = "fuse")]
crate::command_enum! {
    (Init, Init),
    (Mount, Mount),
    (Tree, Tree),
    (Version, Version),
}

#[cfg(not(feature = "fuse"))]
crate::command_enum! {
    (Init, Init),
    (Tree, Tree),
    (Version, Version),
}
