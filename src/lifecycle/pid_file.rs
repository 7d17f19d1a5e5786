//! PID file owned by the primary.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A written PID file. Removal ignores an already-missing file.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Write `pid` followed by a newline, replacing any previous content.
    pub fn write(path: &Path, pid: u32) -> io::Result<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        writeln!(file, "{pid}")?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn remove(self) {
        match fs::remove_file(&self.path) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), %error, "Failed to remove PID file");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.pid");

        let pid_file = PidFile::write(&path, 4242).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "4242\n");

        pid_file.remove();
        assert!(!path.exists());
    }

    #[test]
    fn removing_a_missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cluster.pid");
        let pid_file = PidFile::write(&path, 1).unwrap();
        fs::remove_file(&path).unwrap();
        pid_file.remove();
    }
}
