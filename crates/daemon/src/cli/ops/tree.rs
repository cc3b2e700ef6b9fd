use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;

use common::mount::{MountController, MountError, MountOptions, Superblock, FS_NAME};
use common::node::{Node, S_IFDIR, S_IFMT};

#[derive(Args, Debug, Clone)]
pub struct Tree {
    /// Comma-separated mount options to fill the instance with
    #[arg(short = 'o', long)]
    pub options: Option<String>,

    /// Print the tree as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON form of a filled instance
#[derive(Debug, Clone, Serialize)]
pub struct TreeListing {
    pub options: MountOptions,
    pub entries: Vec<TreeEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
    pub path: String,
    pub kind: &'static str,
    pub mode: String,
    #[serde(skip)]
    raw_mode: u32,
    pub uid: u32,
    pub gid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<i64>,
}

impl TreeEntry {
    fn new(sb: &Superblock, path: String, node: &Node) -> Self {
        let meta = node.metadata();
        Self {
            path,
            kind: if node.is_dir() { "directory" } else { "file" },
            mode: format!("{:o}", node.mode()),
            raw_mode: node.mode(),
            uid: meta.uid,
            gid: meta.gid,
            value: node.counter().and_then(|id| sb.counters().get(id)),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("failed to fill instance: {0}")]
    Mount(#[from] MountError),
    #[error("failed to encode tree: {0}")]
    Json(#[from] serde_json::Error),
}

/// `ls -l` style permission string, e.g. `drwxr-xr-x`
fn mode_string(mode: u32) -> String {
    let mut out = String::with_capacity(10);
    out.push(if mode & S_IFMT == S_IFDIR { 'd' } else { '-' });
    for shift in [6, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

fn render(entries: &[TreeEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            let mode = mode_string(entry.raw_mode);
            let path = if entry.kind == "directory" {
                entry.path.blue().bold().to_string()
            } else {
                entry.path.clone()
            };
            match entry.value {
                Some(value) => format!(
                    "{} {:>5} {:>5} {} = {}",
                    mode, entry.uid, entry.gid, path, value.yellow()
                ),
                None => format!("{} {:>5} {:>5} {}", mode, entry.uid, entry.gid, path),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Tree {
    type Error = TreeError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let data = self
            .options
            .clone()
            .unwrap_or_else(|| ctx.config.mount_options.clone());

        let controller = MountController::new();
        let sb = controller.mount(FS_NAME, "none", &data)?;
        let listing = TreeListing {
            options: sb.options().clone(),
            entries: sb
                .walk()
                .into_iter()
                .map(|(path, node)| TreeEntry::new(&sb, path, node))
                .collect(),
        };
        controller.unmount(sb);

        if self.json {
            Ok(serde_json::to_string_pretty(&listing)?)
        } else {
            Ok(render(&listing.entries))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::op::{Op, OpContext};
    use pikaqfs::Config;

    fn context() -> OpContext {
        OpContext {
            config_path: None,
            config: Config::default(),
        }
    }

    #[test]
    fn test_mode_string() {
        assert_eq!(mode_string(0o040755), "drwxr-xr-x");
        assert_eq!(mode_string(0o040644), "drw-r--r--");
        assert_eq!(mode_string(0o100644), "-rw-r--r--");
    }

    #[tokio::test]
    async fn test_tree_json() {
        let op = Tree {
            options: Some("legacy_dir_mode,uid=42".to_string()),
            json: true,
        };
        let output = op.execute(&context()).await.unwrap();
        let listing: serde_json::Value = serde_json::from_str(&output).unwrap();
        let entries = listing["entries"].as_array().unwrap();

        let paths: Vec<&str> = entries.iter().filter_map(|e| e["path"].as_str()).collect();
        assert_eq!(
            paths,
            vec!["/", "/mycounter", "/mysubdir", "/mysubdir/mysubcounter"]
        );
        assert_eq!(entries[1]["value"], 0);
        assert_eq!(entries[1]["mode"], "100644");
        assert_eq!(entries[2]["mode"], "40644");

        assert_eq!(listing["options"]["legacy_dir_mode"], true);
        assert!(listing["options"].get("max_nodes").is_none());
        let owner = common::NodeFactory::new().uid();
        assert!(entries.iter().all(|e| e["uid"] == owner));
    }

    #[tokio::test]
    async fn test_tree_ignores_bad_options() {
        let op = Tree {
            options: Some("max_nodes=lots,uid=root,gid".to_string()),
            json: false,
        };
        let output = op.execute(&context()).await.unwrap();

        assert_eq!(output.lines().count(), 4);
        assert!(output.contains("mysubcounter"));
    }
}
