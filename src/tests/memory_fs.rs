//! In-memory file system for tests: files plus their implied parent
//! directories, no disk access.

use std::{
    io,
    path::{Path, PathBuf},
};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::FileSystem;

#[derive(Debug, Default, Clone)]
pub struct MemoryFS {
    files: FxHashMap<PathBuf, Vec<u8>>,
    directories: FxHashSet<PathBuf>,
}

impl MemoryFS {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let mut fs = Self::default();
        for (path, content) in files {
            fs.add(path, content.as_bytes().to_vec());
        }
        fs
    }

    pub fn add(&mut self, path: &str, bytes: Vec<u8>) {
        let path = PathBuf::from(path);
        for ancestor in path.ancestors().skip(1) {
            self.directories.insert(ancestor.to_path_buf());
        }
        self.files.insert(path, bytes);
    }
}

impl FileSystem for MemoryFS {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("File not found: {}", path.display()))
        })
    }

    fn exists_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn exists_dir(&self, path: &Path) -> bool {
        self.directories.contains(path)
    }
}

#[test]
fn implied_directories() {
    let fs = MemoryFS::new(&[("/a/b/c.js", "")]);
    assert!(fs.exists_file(Path::new("/a/b/c.js")));
    assert!(fs.exists_dir(Path::new("/a/b")));
    assert!(fs.exists_dir(Path::new("/a")));
    assert!(!fs.exists_file(Path::new("/a/b")));
    assert!(!fs.exists_dir(Path::new("/a/b/c.js")));
    assert!(fs.read(Path::new("/missing")).is_err());
}
