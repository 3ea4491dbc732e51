use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use crate::{
    bundle::{BundleError, BundleReader, ContainerHeader, ContainerKind},
    config::EngineOptions,
};

/// The files written by [`extract_bundle`].
#[derive(Debug)]
pub struct ExtractedBundle {
    pub header: ContainerHeader,
    pub ux: Vec<Utf8PathBuf>,
    pub attached: Vec<Utf8PathBuf>,
}

/// Extracts the UX container of `bundle` into `ux_folder` and, when a folder is given, its
/// attached container into `attached_folder`.
pub fn extract_bundle(
    bundle: &Utf8Path,
    ux_folder: &Utf8Path,
    attached_folder: Option<&Utf8Path>,
    options: &EngineOptions,
) -> Result<ExtractedBundle, BundleError> {
    let mut reader = BundleReader::open(bundle)?;
    let codec = options.codec();
    let staging_folder = options.intermediate_folder_for(ux_folder);

    let ux = reader.extract_container(ContainerKind::Ux, ux_folder, &codec, &staging_folder)?;

    let attached = match attached_folder {
        Some(attached_folder) => reader.extract_container(
            ContainerKind::Attached,
            attached_folder,
            &codec,
            &staging_folder,
        )?,
        None => {
            if !reader.address(ContainerKind::Attached).is_empty() {
                warn!("{bundle} has an attached container but no folder was given to extract it to");
            }
            Vec::new()
        }
    };

    let header = *reader.header();
    reader.close();

    Ok(ExtractedBundle {
        header,
        ux,
        attached,
    })
}
