use std::convert::Infallible;
use std::str::FromStr;

use serde::Serialize;

/// Options parsed from the mount data string
///
/// Mount data never fails a mount: the counter tree is the same whatever is
/// passed. Two extensions are recognised, `max_nodes=N` (node budget for
/// the instance) and `legacy_dir_mode`; anything else, including malformed
/// values, is logged and ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MountOptions {
    /// Upper bound on the number of nodes the instance may allocate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_nodes: Option<u64>,
    /// Create sub-directories with the historic file-style mode
    pub legacy_dir_mode: bool,
}

impl MountOptions {
    pub fn parse(data: &str) -> Self {
        let mut options = Self::default();

        for option in data.split(',').map(str::trim).filter(|o| !o.is_empty()) {
            let (key, value) = match option.split_once('=') {
                Some((key, value)) => (key.trim(), Some(value.trim())),
                None => (option, None),
            };

            match (key, value) {
                ("max_nodes", Some(value)) => match value.parse() {
                    Ok(limit) => options.max_nodes = Some(limit),
                    Err(_) => tracing::warn!("ignoring malformed mount option '{}'", option),
                },
                ("legacy_dir_mode", None) => options.legacy_dir_mode = true,
                _ => tracing::debug!("ignoring mount option '{}'", option),
            }
        }

        options
    }
}

impl FromStr for MountOptions {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
