use std::{
    fs::{self, File},
    io::{self, Read, Seek, Write},
};

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    BundleError, BundleReader, ContainerAddress, ContainerHeader, ContainerKind, HEADER_SIZE,
};
use crate::{binary::WriteBytesExt, container::ExtractionError};

/// Writes a bundle into a temporary file that only replaces the output path once the bundle is
/// complete.
///
/// Dropping a writer without finalizing it deletes the temporary file.
pub struct BundleWriter {
    output: NamedTempFile,
    destination: Utf8PathBuf,
    position: u64,
    engine_size: u64,
    ux_container: Option<ContainerAddress>,
    attached_container: Option<ContainerAddress>,
}

impl BundleWriter {
    /// Starts a bundle by streaming the engine at `engine_path` into a temporary file created
    /// in `intermediate_folder`.
    pub fn create(
        engine_path: &Utf8Path,
        output_path: &Utf8Path,
        intermediate_folder: &Utf8Path,
    ) -> Result<Self, BundleError> {
        let mut engine = File::open(engine_path)?;

        fs::create_dir_all(intermediate_folder)?;
        let mut output = NamedTempFile::new_in(intermediate_folder)?;
        debug!(temp_path = %output.path().display(), "Created temporary bundle");

        let engine_size = io::copy(&mut engine, output.as_file_mut())?;
        info!("Copied {engine_size} byte engine from {engine_path}");

        Ok(Self {
            output,
            destination: output_path.to_path_buf(),
            position: engine_size,
            engine_size,
            ux_container: None,
            attached_container: None,
        })
    }

    /// Appends a container's bytes, returning where they were written.
    ///
    /// The UX container can only be appended once and must come before the attached container.
    /// Only one attached container can be appended.
    pub fn append_container<R: Read + ?Sized>(
        &mut self,
        kind: ContainerKind,
        container: &mut R,
    ) -> Result<ContainerAddress, BundleError> {
        match kind {
            ContainerKind::Ux
                if self.ux_container.is_some() || self.attached_container.is_some() =>
            {
                return Err(BundleError::ContainerOutOfOrder);
            }
            ContainerKind::Attached if self.attached_container.is_some() => {
                return Err(BundleError::MultipleAttachedContainersUnsupported);
            }
            _ => {}
        }

        let size = io::copy(container, self.output.as_file_mut())?;
        let address = ContainerAddress::new(self.position, size);
        self.position += size;

        match kind {
            ContainerKind::Ux => self.ux_container = Some(address),
            ContainerKind::Attached => self.attached_container = Some(address),
        }

        info!(
            offset = address.offset,
            size = address.size,
            "Appended {kind} container"
        );

        Ok(address)
    }

    /// Writes the container header and moves the finished bundle to the output path.
    pub fn finalize(mut self, bundle_id: Uuid) -> Result<ContainerHeader, BundleError> {
        let ux_container_size = self.ux_container.map_or(0, |address| address.size);
        let attached_container_size = self.attached_container.map_or(0, |address| address.size);

        if ux_container_size == 0 {
            warn!("{} has no UX container", self.destination);
        }

        let header = ContainerHeader::new(
            bundle_id,
            self.engine_size,
            ux_container_size,
            attached_container_size,
        );
        debug!(?header);

        self.output.write_t(&header)?;
        self.position += HEADER_SIZE as u64;

        self.persist()?;

        Ok(header)
    }

    /// Copies the containers and container header of `original` behind the engine this writer
    /// was created with, then moves the bundle to the output path.
    ///
    /// The engine must be exactly as long as the engine in `original` because the copied header
    /// is not recomputed. No container is decoded.
    pub fn reattach_containers(
        mut self,
        original: &mut BundleReader,
    ) -> Result<ContainerHeader, BundleError> {
        if self.ux_container.is_some() || self.attached_container.is_some() {
            return Err(BundleError::ContainerOutOfOrder);
        }

        let header = *original.header();
        if self.engine_size != header.engine_size() {
            return Err(BundleError::EngineSizeChangedDuringSigning {
                expected: header.engine_size(),
                actual: self.engine_size,
            });
        }

        for kind in [ContainerKind::Ux, ContainerKind::Attached] {
            let address = original.address(kind);
            let copied = original.copy_range(address, self.output.as_file_mut())?;
            if copied != address.size {
                return Err(BundleError::extraction(
                    kind,
                    ExtractionError::Truncated {
                        expected: address.size,
                        actual: copied,
                    },
                ));
            }
            debug!(offset = address.offset, size = address.size, "Reattached {kind} container");
            self.position += copied;
        }

        let raw_header = original.raw_header()?;
        self.output.write_all(&raw_header)?;
        self.position += raw_header.len() as u64;

        if self.position != original.file_length() {
            return Err(BundleError::ReattachedLengthMismatch {
                expected: original.file_length(),
                actual: self.position,
            });
        }

        info!("Reattached the containers of {}", original.path());

        self.persist()?;

        Ok(header)
    }

    /// Streams the engine of `original` into `destination` so it can be signed.
    pub fn copy_engine_out_of<W: Write + ?Sized>(
        original: &mut BundleReader,
        destination: &mut W,
    ) -> Result<u64, BundleError> {
        let expected = original.header().engine_size();

        let copied = original.copy_range(ContainerAddress::new(0, expected), destination)?;
        if copied != expected {
            return Err(BundleError::EngineExtractionIncomplete {
                expected,
                actual: copied,
            });
        }

        destination.flush()?;
        info!("Copied {copied} byte engine out of {}", original.path());

        Ok(copied)
    }

    fn persist(self) -> Result<(), BundleError> {
        persist_temp_file(self.output, &self.destination)?;
        info!("Wrote {} bytes to {}", self.position, self.destination);
        Ok(())
    }
}

/// Moves a finished temporary file to `destination`, creating its parent folders.
///
/// When the temporary file is on another file system than `destination`, it is copied into a
/// second temporary file next to `destination` which is then renamed into place.
pub(crate) fn persist_temp_file(
    file: NamedTempFile,
    destination: &Utf8Path,
) -> Result<(), BundleError> {
    file.as_file().sync_all()?;

    let parent = destination
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    fs::create_dir_all(parent)?;

    match file.persist(destination) {
        Ok(_) => Ok(()),
        Err(error) if error.error.kind() == io::ErrorKind::CrossesDevices => {
            debug!("{destination} is on another device, copying instead");
            let mut file = error.file;
            file.rewind()?;
            let mut local = NamedTempFile::new_in(parent)?;
            io::copy(file.as_file_mut(), local.as_file_mut())?;
            local.as_file().sync_all()?;
            local.persist(destination)?;
            Ok(())
        }
        Err(error) => Err(error.into()),
    }
}
