use std::{fs, io};

use camino::{Utf8Path, Utf8PathBuf};
use derive_more::Display;
use tracing::{debug, info};

#[derive(Copy, Clone, Debug, Default, Display, Eq, PartialEq)]
pub enum TransferMode {
    #[default]
    #[display("Copying")]
    Copy,
    #[display("Moving")]
    Move,
}

/// A planned copy or move of a single file, such as an external payload placed next to the
/// bundle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileTransfer {
    source: Utf8PathBuf,
    destination: Utf8PathBuf,
    mode: TransferMode,
}

impl FileTransfer {
    /// Plans a transfer, or returns `None` when the source and destination are the same file.
    pub fn plan<S, D>(source: S, destination: D, mode: TransferMode) -> Option<Self>
    where
        S: Into<Utf8PathBuf>,
        D: Into<Utf8PathBuf>,
    {
        let source = source.into();
        let destination = destination.into();

        if is_same_file(&source, &destination) {
            debug!(%source, "Skipping transfer onto itself");
            return None;
        }

        Some(Self {
            source,
            destination,
            mode,
        })
    }

    #[inline]
    pub fn source(&self) -> &Utf8Path {
        &self.source
    }

    #[inline]
    pub fn destination(&self) -> &Utf8Path {
        &self.destination
    }

    /// Performs the transfer, creating the destination's parent folders, and returns the
    /// number of bytes transferred.
    pub fn execute(&self) -> io::Result<u64> {
        info!("{} {} to {}", self.mode, self.source, self.destination);

        if let Some(parent) = self
            .destination
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
        {
            fs::create_dir_all(parent)?;
        }

        match self.mode {
            TransferMode::Copy => fs::copy(&self.source, &self.destination),
            TransferMode::Move => {
                let size = fs::metadata(&self.source)?.len();
                match fs::rename(&self.source, &self.destination) {
                    Ok(()) => Ok(size),
                    Err(error) if error.kind() == io::ErrorKind::CrossesDevices => {
                        debug!("{} is on another device, copying instead", self.destination);
                        let copied = fs::copy(&self.source, &self.destination)?;
                        fs::remove_file(&self.source)?;
                        Ok(copied)
                    }
                    Err(error) => Err(error),
                }
            }
        }
    }
}

fn is_same_file(source: &Utf8Path, destination: &Utf8Path) -> bool {
    if source == destination {
        return true;
    }

    match (source.canonicalize_utf8(), destination.canonicalize_utf8()) {
        (Ok(source), Ok(destination)) => source == destination,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use camino::Utf8Path;
    use rstest::rstest;

    use super::{FileTransfer, TransferMode};

    #[rstest]
    fn same_path_is_not_planned(
        #[values(TransferMode::Copy, TransferMode::Move)] mode: TransferMode,
    ) {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();
        let file = root.join("payload.msi");
        fs::write(&file, b"msi").unwrap();

        assert_eq!(FileTransfer::plan(&file, &file, mode), None);
        assert_eq!(
            FileTransfer::plan(&file, root.join(".").join("payload.msi"), mode),
            None
        );
    }

    #[test]
    fn copy_creates_parent_folders() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();
        let source = root.join("payload.msi");
        fs::write(&source, b"msi bytes").unwrap();
        let destination = root.join("out").join("redist").join("payload.msi");

        let copied = FileTransfer::plan(&source, &destination, TransferMode::Copy)
            .unwrap()
            .execute()
            .unwrap();

        assert_eq!(copied, 9);
        assert_eq!(fs::read(&destination).unwrap(), b"msi bytes");
        assert!(source.exists());
    }

    #[test]
    fn move_removes_source() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();
        let source = root.join("payload.msi");
        fs::write(&source, b"msi bytes").unwrap();
        let destination = root.join("out").join("payload.msi");

        let transfer = FileTransfer::plan(&source, &destination, TransferMode::Move).unwrap();
        assert_eq!(transfer.execute().unwrap(), 9);

        assert!(!source.exists());
        assert_eq!(fs::read(&destination).unwrap(), b"msi bytes");
    }

    #[test]
    fn missing_source_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(temp_dir.path()).unwrap();

        let transfer = FileTransfer::plan(
            root.join("missing.msi"),
            root.join("out.msi"),
            TransferMode::Copy,
        )
        .unwrap();

        assert!(transfer.execute().is_err());
    }
}
