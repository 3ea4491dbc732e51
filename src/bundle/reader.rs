use std::{
    fs::{self, File},
    io::{self, Seek, Write},
};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use super::{
    BundleError, ContainerAddress, ContainerHeader, ContainerKind, HEADER_SIZE, copy::copy_range,
};
use crate::{
    binary::ReadBytesExt,
    container::{ContainerCodec, ContainerEntryInfo, ExtractionError},
};

/// An open bundle whose container header has been located and validated.
///
/// The file handle is held for the reader's lifetime and released when it is dropped or
/// [closed](Self::close).
pub struct BundleReader {
    path: Utf8PathBuf,
    file: File,
    header_offset: u64,
    header: ContainerHeader,
}

impl BundleReader {
    pub fn open<P: AsRef<Utf8Path>>(path: P) -> Result<Self, BundleError> {
        let path = path.as_ref();
        let mut file = File::open(path)?;

        let (header_offset, header) = ContainerHeader::locate(&mut file)?;
        debug!(?header, header_offset, "Located container header");

        let file_length = header_offset + HEADER_SIZE as u64;
        if let Some(total_size) = header.total_size().filter(|&size| size < file_length) {
            warn!(
                "{path} has {} bytes between its containers and its container header that are not accounted for",
                file_length - total_size
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header_offset,
            header,
        })
    }

    #[inline]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    #[inline]
    pub const fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// The offset the container header starts at.
    #[inline]
    pub const fn header_offset(&self) -> u64 {
        self.header_offset
    }

    /// The length of the bundle file in bytes.
    #[inline]
    pub const fn file_length(&self) -> u64 {
        self.header_offset + HEADER_SIZE as u64
    }

    #[inline]
    pub const fn address(&self, kind: ContainerKind) -> ContainerAddress {
        self.header.address(kind)
    }

    /// Streams an arbitrary byte range of the bundle into `writer`, returning the number of
    /// bytes copied.
    pub(super) fn copy_range<W: Write + ?Sized>(
        &mut self,
        address: ContainerAddress,
        writer: &mut W,
    ) -> io::Result<u64> {
        copy_range(&mut self.file, address, writer)
    }

    /// Reads the container header exactly as it is stored on disk.
    pub(super) fn raw_header(&mut self) -> io::Result<[u8; HEADER_SIZE]> {
        self.file.seek(io::SeekFrom::Start(self.header_offset))?;
        self.file.read_t()
    }

    /// Copies a container's bytes into a staging file in `staging_folder`, rewound and ready
    /// to be decoded.
    fn stage_container(
        &mut self,
        kind: ContainerKind,
        staging_folder: &Utf8Path,
    ) -> Result<File, ExtractionError> {
        let address = self.address(kind);

        fs::create_dir_all(staging_folder)?;
        let mut staging = tempfile::tempfile_in(staging_folder)?;

        let copied = self.copy_range(address, &mut staging)?;
        if copied != address.size {
            return Err(ExtractionError::Truncated {
                expected: address.size,
                actual: copied,
            });
        }

        staging.rewind()?;
        Ok(staging)
    }

    /// Extracts every payload of a container into `destination`.
    ///
    /// A container with a recorded size of zero is absent, so nothing is extracted and
    /// `destination` is not created.
    pub fn extract_container<C: ContainerCodec>(
        &mut self,
        kind: ContainerKind,
        destination: &Utf8Path,
        codec: &C,
        staging_folder: &Utf8Path,
    ) -> Result<Vec<Utf8PathBuf>, BundleError> {
        if self.address(kind).is_empty() {
            debug!("{} has no {kind} container", self.path);
            return Ok(Vec::new());
        }

        let staging = self
            .stage_container(kind, staging_folder)
            .map_err(|error| BundleError::extraction(kind, error))?;

        let extracted = codec
            .decode(staging, destination)
            .map_err(|error| BundleError::extraction(kind, error))?;

        info!(
            "Extracted {} files from the {kind} container to {destination}",
            extracted.len()
        );

        Ok(extracted)
    }

    /// Lists the entries of a container without extracting them.
    pub fn list_container<C: ContainerCodec>(
        &mut self,
        kind: ContainerKind,
        codec: &C,
        staging_folder: &Utf8Path,
    ) -> Result<Vec<ContainerEntryInfo>, BundleError> {
        if self.address(kind).is_empty() {
            return Ok(Vec::new());
        }

        let staging = self
            .stage_container(kind, staging_folder)
            .map_err(|error| BundleError::extraction(kind, error))?;

        codec
            .list(staging)
            .map_err(|error| BundleError::extraction(kind, error))
    }

    /// Releases the file handle.
    pub fn close(self) {
        debug!("Closing {}", self.path);
    }
}
