//! The file-output collaborator. [`crate::build::Builder`] does all of its
//! file-system work through the [`FileOps`] trait; [`LocalFs`] is the
//! implementation backed by the real file system.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

/// Name of the version-control directory that survives
/// [`FileOps::clean_directory`].
pub const PRESERVED_ENTRY: &str = ".git";

/// The outcome of a [`FileOps::copy_tree`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyReport {
    /// Files copied.
    pub copied: usize,

    /// Entries skipped: symbolic links and paths outside the source root.
    pub skipped: usize,
}

/// File-system operations used by a build.
pub trait FileOps {
    /// Writes `contents` to `path`, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Reads the UTF-8 file at `path`.
    fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Returns whether `path` exists.
    fn exists(&self, path: &Path) -> bool;

    /// Empties `dir` (creating it if needed), keeping a top-level
    /// [`PRESERVED_ENTRY`] if present.
    fn clean_directory(&self, dir: &Path) -> Result<()>;

    /// Removes `dir` and everything in it. A missing `dir` is not an error.
    fn remove_tree(&self, dir: &Path) -> Result<()>;

    /// Removes the file at `path`, returning whether it existed.
    fn remove_file(&self, path: &Path) -> Result<bool>;

    /// Recursively copies `src` into `dst`. Symbolic links are never
    /// followed or copied, and nothing outside `src` is copied. A missing
    /// `src` copies nothing.
    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<CopyReport>;

    /// Lists the `.md` files directly inside `dir`, sorted by file name.
    /// A missing `dir` lists nothing.
    fn list_markdown_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

/// [`FileOps`] over [`std::fs`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalFs;

impl FileOps for LocalFs {
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
        }
        fs::write(path, contents).map_err(|err| Error::io(path, err))?;
        debug!(path = %path.display(), "wrote file");
        Ok(())
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|err| Error::io(path, err))
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn clean_directory(&self, dir: &Path) -> Result<()> {
        if !dir.exists() {
            return fs::create_dir_all(dir).map_err(|err| Error::io(dir, err));
        }
        for entry in fs::read_dir(dir).map_err(|err| Error::io(dir, err))? {
            let entry = entry.map_err(|err| Error::io(dir, err))?;
            if entry.file_name() == PRESERVED_ENTRY {
                continue;
            }
            let path = entry.path();
            let file_type = entry.file_type().map_err(|err| Error::io(&path, err))?;
            let removed = if file_type.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(|err| Error::io(&path, err))?;
        }
        Ok(())
    }

    fn remove_tree(&self, dir: &Path) -> Result<()> {
        match fs::remove_dir_all(dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::io(dir, e)),
        }
    }

    fn remove_file(&self, path: &Path) -> Result<bool> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    fn copy_tree(&self, src: &Path, dst: &Path) -> Result<CopyReport> {
        let mut report = CopyReport::default();
        if !src.is_dir() {
            return Ok(report);
        }

        for result in WalkDir::new(src).follow_links(false).min_depth(1) {
            let entry = result?;
            if entry.path_is_symlink() {
                warn!(path = %entry.path().display(), "skipping symbolic link");
                report.skipped += 1;
                continue;
            }

            let relative = match contained_relative_path(src, entry.path()) {
                Some(relative) => relative,
                None => {
                    warn!(
                        path = %entry.path().display(),
                        root = %src.display(),
                        "skipping path outside of its source root"
                    );
                    report.skipped += 1;
                    continue;
                }
            };

            let target = dst.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&target).map_err(|err| Error::io(&target, err))?;
            } else if entry.file_type().is_file() {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).map_err(|err| Error::io(parent, err))?;
                }
                fs::copy(entry.path(), &target).map_err(|err| Error::io(entry.path(), err))?;
                report.copied += 1;
            }
        }
        Ok(report)
    }

    fn list_markdown_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(|err| Error::io(dir, err))? {
            let entry = entry.map_err(|err| Error::io(dir, err))?;
            let path = entry.path();
            let is_file = entry
                .file_type()
                .map_err(|err| Error::io(&path, err))?
                .is_file();
            if is_file && path.extension().map_or(false, |ext| ext == "md") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Returns `path` relative to `root` if it is lexically contained in it
/// (no `..`, root, or prefix components once the root is stripped).
pub fn contained_relative_path<'a>(root: &Path, path: &'a Path) -> Option<&'a Path> {
    let relative = path.strip_prefix(root).ok()?;
    if relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    {
        Some(relative)
    } else {
        None
    }
}

/// The result of a fallible file operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a file operation.
#[derive(Debug)]
pub enum Error {
    /// An I/O error on a specific path.
    Io { path: PathBuf, err: io::Error },

    /// An error walking a directory tree.
    WalkDir(walkdir::Error),
}

impl Error {
    fn io(path: &Path, err: io::Error) -> Error {
        Error::Io {
            path: path.to_owned(),
            err,
        }
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io { path, err } => write!(f, "'{}': {}", path.display(), err),
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { err, .. } => Some(err),
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator while walking directories.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
