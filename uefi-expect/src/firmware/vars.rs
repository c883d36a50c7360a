//! Per-run copies of the firmware variable store.

use std::fs::File;
use std::io;
use std::path::Path;

use log::debug;
use tempfile::NamedTempFile;

use crate::error::FirmwareError;

/// A private, writable copy of a vars template.
///
/// The copy is removed exactly once: by [`VarsStore::close`], or when the
/// store is dropped on an early-return path.
#[derive(Debug)]
pub struct VarsStore {
    file: NamedTempFile,
}

impl VarsStore {
    /// Copy `template` into a new temporary file.
    pub fn create(template: &Path) -> Result<Self, FirmwareError> {
        Self::create_in(std::env::temp_dir(), template)
    }

    /// Copy `template` into a new temporary file inside `dir`.
    pub fn create_in(dir: impl AsRef<Path>, template: &Path) -> Result<Self, FirmwareError> {
        let vars_error = |source| FirmwareError::VarsStore {
            path: template.to_path_buf(),
            source,
        };

        let mut source = File::open(template).map_err(vars_error)?;
        let mut file = tempfile::Builder::new()
            .prefix("uefi-vars-")
            .suffix(".fd")
            .tempfile_in(dir)
            .map_err(vars_error)?;
        io::copy(&mut source, file.as_file_mut()).map_err(vars_error)?;

        debug!("Copied {} to {}", template.display(), file.path().display());
        Ok(Self { file })
    }

    /// Path of the copy, handed to the emulator.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the copy, reporting any error.
    pub fn close(self) -> io::Result<()> {
        debug!("Removing {}", self.file.path().display());
        self.file.close()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_copy_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("OVMF_VARS.fd");
        fs::write(&template, b"\x00\x01vars").unwrap();

        let store = VarsStore::create_in(dir.path(), &template).unwrap();
        let path = store.path().to_path_buf();
        assert_ne!(path, template);
        assert_eq!(fs::read(&path).unwrap(), b"\x00\x01vars");

        store.close().unwrap();
        assert!(!path.exists());
        assert!(template.exists());
    }

    #[test]
    fn test_drop_removes_copy() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("AAVMF_VARS.fd");
        fs::write(&template, b"vars").unwrap();

        let path = {
            let store = VarsStore::create_in(dir.path(), &template).unwrap();
            store.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_template() {
        let dir = tempfile::tempdir().unwrap();
        let err = VarsStore::create_in(dir.path(), &dir.path().join("missing.fd")).unwrap_err();
        assert!(matches!(err, FirmwareError::VarsStore { .. }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
