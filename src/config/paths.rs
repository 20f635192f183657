use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

const DIR_PREFIX: &str = "hassbridge";

/// Temporary directory holding cached artwork.
///
/// Created at startup with a unique name under the system temp directory and
/// removed, contents included, when dropped.
#[derive(Debug)]
pub struct ArtworkDir {
    path: PathBuf,
}

impl ArtworkDir {
    /// Create a fresh directory under the system temp directory
    ///
    /// # Errors
    /// Returns an error if no unique directory can be created
    pub fn create() -> io::Result<Self> {
        Self::create_in(&env::temp_dir())
    }

    /// Create a fresh directory under `parent`
    ///
    /// # Errors
    /// Returns an error if no unique directory can be created
    pub fn create_in(parent: &Path) -> io::Result<Self> {
        const ATTEMPTS: u32 = 16;

        let pid = std::process::id();
        for attempt in 0..ATTEMPTS {
            let path = parent.join(format!("{DIR_PREFIX}-{pid}-{attempt}"));
            match fs::create_dir(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "Created artwork directory");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "no free artwork directory name",
        ))
    }

    /// Location of the directory
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ArtworkDir {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed artwork directory"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Cannot remove artwork directory"),
        }
    }
}
