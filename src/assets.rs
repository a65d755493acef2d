//! Device-class and mapping data files.
//!
//! The engine reads its data through [`AssetSource`] so that the bundle
//! compiled into the binary can be swapped for a directory on disk.

use std::path::PathBuf;

use crate::error::{Error, Result};

pub const CLASS_DIR: &str = "device-classes";
pub const MAPPING_DIR: &str = "mappings";

/// Read-only file tree with `/`-separated relative paths.
pub trait AssetSource: Send + Sync {
    /// Every file below `dir`, recursively, sorted, relative to `dir`.
    fn list(&self, dir: &str) -> Result<Vec<String>>;

    /// Contents of `path`; `NotFound` when absent.
    fn read(&self, path: &str) -> Result<String>;
}

macro_rules! embed {
    ($($path:literal),* $(,)?) => {
        &[$(($path, include_str!(concat!("../assets/", $path)))),*]
    };
}

static EMBEDDED: &[(&str, &str)] = embed!(
    "device-classes/generic.yaml",
    "device-classes/adva_fsp3kr7.yaml",
    "device-classes/aruba.yaml",
    "device-classes/aviat.yaml",
    "device-classes/ceragon.yaml",
    "device-classes/ceragon/ip10.yaml",
    "device-classes/ceragon/ip20.yaml",
    "device-classes/ekinops.yaml",
    "device-classes/fortigate.yaml",
    "device-classes/ios.yaml",
    "device-classes/ironware.yaml",
    "device-classes/junos.yaml",
    "device-classes/linux.yaml",
    "device-classes/linux/logpoint.yaml",
    "device-classes/powerone.yaml",
    "device-classes/powerone/acc.yaml",
    "device-classes/powerone/pcc.yaml",
    "device-classes/routeros.yaml",
    "device-classes/timos.yaml",
    "device-classes/timos/sas.yaml",
    "device-classes/vmware_esxi.yaml",
    "mappings/ifType.yaml",
    "mappings/ceragonModel.yaml",
    "mappings/fortigateHaMode.yaml",
);

/// The bundle compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedAssets;

impl AssetSource for EmbeddedAssets {
    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut out: Vec<String> = EMBEDDED
            .iter()
            .filter_map(|(path, _)| path.strip_prefix(&prefix))
            .map(str::to_owned)
            .collect();
        out.sort();
        Ok(out)
    }

    fn read(&self, path: &str) -> Result<String> {
        EMBEDDED
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, contents)| (*contents).to_owned())
            .ok_or_else(|| Error::not_found(format!("asset '{path}'")))
    }
}

/// Assets read from a directory with the same layout as the bundle.
#[derive(Debug, Clone)]
pub struct DirAssets {
    root: PathBuf,
}

impl DirAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetSource for DirAssets {
    fn list(&self, dir: &str) -> Result<Vec<String>> {
        let base = self.root.join(dir);
        let mut out = Vec::new();
        let mut pending = vec![base.clone()];
        while let Some(current) = pending.pop() {
            let entries = std::fs::read_dir(&current)
                .map_err(|e| Error::config(format!("{}: {e}", current.display())))?;
            for entry in entries {
                let path = entry
                    .map_err(|e| Error::config(format!("{}: {e}", current.display())))?
                    .path();
                if path.is_dir() {
                    pending.push(path);
                } else if let Ok(rel) = path.strip_prefix(&base) {
                    let parts: Vec<_> = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    out.push(parts.join("/"));
                }
            }
        }
        out.sort();
        Ok(out)
    }

    fn read(&self, path: &str) -> Result<String> {
        let full = self.root.join(path);
        match std::fs::read_to_string(&full) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(format!("asset '{path}'")))
            }
            Err(e) => Err(Error::config(format!("{}: {e}", full.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_lists_nested_classes() {
        let classes = EmbeddedAssets.list(CLASS_DIR).unwrap();
        assert!(classes.contains(&"generic.yaml".to_owned()));
        assert!(classes.contains(&"ceragon/ip10.yaml".to_owned()));
        assert!(EmbeddedAssets.read("mappings/nope.yaml").unwrap_err().is_not_found());
    }

    #[test]
    fn directory_source_mirrors_layout() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("device-classes/acme")).unwrap();
        std::fs::write(dir.path().join("device-classes/acme.yaml"), "{}").unwrap();
        std::fs::write(dir.path().join("device-classes/acme/x1.yaml"), "{}").unwrap();
        let assets = DirAssets::new(dir.path());
        assert_eq!(
            assets.list(CLASS_DIR).unwrap(),
            ["acme.yaml", "acme/x1.yaml"]
        );
        assert_eq!(assets.read("device-classes/acme.yaml").unwrap(), "{}");
        assert!(assets.read("device-classes/none.yaml").unwrap_err().is_not_found());
    }
}
