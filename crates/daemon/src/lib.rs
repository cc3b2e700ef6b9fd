// App configuration and logging
pub mod config;
pub mod logging;

// Kernel-facing surface
#[cfg(feature = "fuse")]
pub mod fuse;

pub use config::{Config, ConfigError};

#[cfg(feature = "fuse")]
pub use fuse::{MountManager, MountManagerConfig};

/// Version and compiled features of this build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub features: Vec<&'static str>,
}

impl std::fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let features = if self.features.is_empty() {
            "none".to_string()
        } else {
            self.features.join(",")
        };
        write!(f, "pikaqfs {} (features: {})", self.version, features)
    }
}

pub fn build_info() -> BuildInfo {
    let mut features = Vec::new();
    if cfg!(feature = "fuse") {
        features.push("fuse");
    }
    BuildInfo {
        version: env!("CARGO_PKG_VERSION"),
        features,
    }
}
