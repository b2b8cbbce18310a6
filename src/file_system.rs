use std::{
    fs, io,
    path::Path,
};

/// File system abstraction used by the build session.
///
/// The bundler core never touches the disk directly: every probe the URL
/// resolver makes and every byte a module loads goes through this trait, so
/// hosts can substitute an in-memory or virtual file system.
///
/// Methods take `&Path` rather than a generic `P: AsRef<Path>` so the trait
/// stays object safe for hosts that hold a `dyn FileSystem`.
pub trait FileSystem: Send + Sync {
    /// Read the raw bytes of a file.
    ///
    /// # Errors
    ///
    /// * See [std::fs::read]
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Read a file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// * See [std::fs::read_to_string]
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }

    /// Whether `path` names an existing regular file.
    fn exists_file(&self, path: &Path) -> bool;

    /// Whether `path` names an existing directory.
    fn exists_dir(&self, path: &Path) -> bool;
}

/// Operating system file system
#[derive(Debug, Default, Clone, Copy)]
pub struct FileSystemOs;

impl FileSystem for FileSystemOs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn exists_file(&self, path: &Path) -> bool {
        fs::metadata(path).is_ok_and(|meta| meta.is_file())
    }

    fn exists_dir(&self, path: &Path) -> bool {
        fs::metadata(path).is_ok_and(|meta| meta.is_dir())
    }
}
