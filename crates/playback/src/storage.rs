use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Named-file store the frames are read from.
pub trait Storage: Send + Sync {
    fn exists(&self, name: &str) -> bool;

    /// Open `name` for reading. The file is closed when the reader drops.
    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>>;
}

/// Files under a mounted directory, addressed by absolute-looking names such
/// as `/output_frame/frame1.bin`.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Succeeds only once `root` exists and is a directory.
    pub fn mounted(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not mounted", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.root.join(name.trim_start_matches('/'))
    }
}

impl Storage for FsStorage {
    fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_file()
    }

    fn open(&self, name: &str) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(self.resolve(name))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_names_resolve_under_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("output_frame")).unwrap();
        fs::write(dir.path().join("output_frame/frame1.bin"), [1, 2, 3]).unwrap();

        let storage = FsStorage::mounted(dir.path()).unwrap();
        assert!(storage.exists("/output_frame/frame1.bin"));
        assert!(storage.exists("output_frame/frame1.bin"));
        assert!(!storage.exists("/output_frame/frame2.bin"));
        assert!(!storage.exists("/output_frame"));

        let mut bytes = Vec::new();
        storage
            .open("/output_frame/frame1.bin")
            .unwrap()
            .read_to_end(&mut bytes)
            .unwrap();
        assert_eq!(bytes, [1, 2, 3]);
    }

    #[test]
    fn test_unmounted_root_is_rejected() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("sd");
        assert!(FsStorage::mounted(&missing).is_err());

        fs::create_dir(&missing).unwrap();
        assert!(FsStorage::mounted(&missing).is_ok());
    }
}
