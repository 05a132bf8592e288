//! Read-only, path-keyed access to either a rooted directory tree or a
//! GameCube/Wii disc image. The disc's sector-level parsing is an external
//! collaborator (spec §1 excludes "the ISO reader"); `DiscPartition` is the
//! narrow trait surface a real disc-image crate would implement, and
//! `DiscFileProvider` adapts it to `FileProvider`.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Read-only access to a game's files, independent of whether they live on
/// disk as a directory tree or packed inside a disc image.
pub trait FileProvider {
    fn is_file(&self, name: &str) -> bool;
    /// Yields provider-relative, forward-slash-separated paths matching a
    /// simple glob pattern (only `*` is supported, matching the one pattern
    /// this crate ever uses: `"*.pak"`).
    fn rglob(&self, pattern: &str) -> Vec<String>;
    fn open_binary(&self, name: &str) -> Result<Vec<u8>>;
    fn get_dol(&self) -> Result<Vec<u8>>;
}

/// Matches the handful of glob patterns this crate needs (`*.pak`,
/// `*`) without pulling in a general glob-matching dependency.
fn glob_match(pattern: &str, candidate: &str) -> bool {
    match pattern.split_once('*') {
        None => pattern == candidate,
        Some((prefix, suffix)) => {
            candidate.len() >= prefix.len() + suffix.len()
                && candidate.starts_with(prefix)
                && candidate.ends_with(suffix)
        }
    }
}

/// Reads from a plain directory on disk, mirroring the original
/// `PathFileProvider`.
pub struct DirectoryFileProvider {
    root: PathBuf,
}

impl DirectoryFileProvider {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", root.display()),
            )));
        }
        Ok(Self { root })
    }

    fn relative_posix(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl FileProvider for DirectoryFileProvider {
    fn is_file(&self, name: &str) -> bool {
        self.root.join(name).is_file()
    }

    fn rglob(&self, pattern: &str) -> Vec<String> {
        let mut out = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = self.relative_posix(entry.path());
            if glob_match(pattern, &relative) {
                out.push(relative);
            }
        }
        out.sort();
        out
    }

    fn open_binary(&self, name: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.root.join(name))?)
    }

    fn get_dol(&self) -> Result<Vec<u8>> {
        self.open_binary("sys/main.dol")
    }
}

/// The narrow surface a GameCube/Wii disc image reader exposes. Implemented
/// by an external collaborator; this crate only consumes it.
pub trait DiscPartition {
    fn files(&self) -> &[String];
    fn read_file(&self, name: &str) -> std::io::Result<Vec<u8>>;
    fn dol(&self) -> std::io::Result<Vec<u8>>;
}

/// Adapts a parsed disc's data partition to `FileProvider`.
pub struct DiscFileProvider<P: DiscPartition> {
    partition: P,
}

impl<P: DiscPartition> DiscFileProvider<P> {
    /// `partition` is `None` when the disc image has no data partition
    /// (audio-only discs, malformed images).
    pub fn new(partition: Option<P>) -> Result<Self> {
        let partition = partition.ok_or_else(|| {
            Error::InvalidImage("disc image does not contain a data partition".to_string())
        })?;
        Ok(Self { partition })
    }
}

impl<P: DiscPartition> FileProvider for DiscFileProvider<P> {
    fn is_file(&self, name: &str) -> bool {
        self.partition.files().iter().any(|f| f == name)
    }

    fn rglob(&self, pattern: &str) -> Vec<String> {
        self.partition
            .files()
            .iter()
            .filter(|f| glob_match(pattern, f))
            .cloned()
            .collect()
    }

    fn open_binary(&self, name: &str) -> Result<Vec<u8>> {
        Ok(self.partition.read_file(name)?)
    }

    fn get_dol(&self) -> Result<Vec<u8>> {
        Ok(self.partition.dol()?)
    }
}

/// Convenience used by tests and by `open_binary` implementations that want
/// to hand back a `Read` instead of a materialized buffer.
pub fn read_all(mut r: impl Read) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_match_suffix_pattern() {
        assert!(glob_match("*.pak", "Metroid2.pak"));
        assert!(!glob_match("*.pak", "Metroid2.pak.bak"));
    }

    #[test]
    fn glob_match_exact_pattern() {
        assert!(glob_match("custom_names.json", "custom_names.json"));
        assert!(!glob_match("custom_names.json", "other.json"));
    }

    struct FakePartition {
        files: Vec<String>,
        data: std::collections::HashMap<String, Vec<u8>>,
    }

    impl DiscPartition for FakePartition {
        fn files(&self) -> &[String] {
            &self.files
        }
        fn read_file(&self, name: &str) -> std::io::Result<Vec<u8>> {
            self.data
                .get(name)
                .cloned()
                .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
        }
        fn dol(&self) -> std::io::Result<Vec<u8>> {
            Ok(vec![0xAB; 4])
        }
    }

    #[test]
    fn disc_provider_requires_data_partition() {
        let result = DiscFileProvider::<FakePartition>::new(None);
        assert!(matches!(result, Err(Error::InvalidImage(_))));
    }

    #[test]
    fn disc_provider_globs_paks() {
        let mut data = std::collections::HashMap::new();
        data.insert("Metroid2.pak".to_string(), vec![1, 2, 3]);
        let partition = FakePartition {
            files: vec!["Metroid2.pak".to_string(), "sys/main.dol".to_string()],
            data,
        };
        let provider = DiscFileProvider::new(Some(partition)).unwrap();
        assert_eq!(provider.rglob("*.pak"), vec!["Metroid2.pak".to_string()]);
        assert_eq!(provider.get_dol().unwrap(), vec![0xAB; 4]);
    }
}
