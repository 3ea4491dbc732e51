use std::{fs, io::Seek};

use camino::Utf8Path;
use tracing::{info, warn};
use uuid::Uuid;

use super::WorkflowError;
use crate::{
    bundle::{BundleWriter, ContainerHeader, ContainerKind},
    config::EngineOptions,
    container::{ContainerBuilder, EntryAddress, PayloadCollision},
    transfer::FileTransfer,
};

/// Everything that goes into a new bundle besides its engine.
pub struct BundleLayout {
    pub ux: ContainerBuilder,
    pub attached: Option<ContainerBuilder>,
    /// External payloads placed next to the bundle once it has been written.
    pub external: Vec<FileTransfer>,
}

#[derive(Debug)]
pub struct CreatedBundle {
    pub header: ContainerHeader,
    pub ux: Vec<EntryAddress>,
    pub attached: Vec<EntryAddress>,
    pub collisions: Vec<PayloadCollision>,
    pub external: Vec<FileTransfer>,
}

/// Builds the containers of `layout` and writes them behind `engine` to `output`.
pub fn create_bundle(
    engine: &Utf8Path,
    output: &Utf8Path,
    bundle_id: Uuid,
    layout: BundleLayout,
    options: &EngineOptions,
) -> Result<CreatedBundle, WorkflowError> {
    let codec = options.codec();
    let intermediate_folder = options.intermediate_folder_for(output);
    fs::create_dir_all(&intermediate_folder)?;

    let mut ux = layout
        .ux
        .build(&codec, tempfile::tempfile_in(&intermediate_folder)?)?;
    let mut attached = layout
        .attached
        .map(|builder| builder.build(&codec, tempfile::tempfile_in(&intermediate_folder)?))
        .transpose()?;

    let mut writer = BundleWriter::create(engine, output, &intermediate_folder)?;

    ux.writer.rewind()?;
    writer.append_container(ContainerKind::Ux, &mut ux.writer)?;

    if let Some(attached) = attached.as_mut().filter(|attached| attached.size > 0) {
        attached.writer.rewind()?;
        writer.append_container(ContainerKind::Attached, &mut attached.writer)?;
    }

    let header = writer.finalize(bundle_id)?;
    info!("Created bundle {bundle_id} at {output}");

    for transfer in &layout.external {
        transfer.execute()?;
    }

    let mut collisions = ux.collisions;
    let attached_entries = attached.map_or_else(Vec::new, |attached| {
        collisions.extend(attached.collisions);
        attached.entries
    });

    if !collisions.is_empty() {
        warn!(
            "{} payloads overwrite an earlier payload when extracted",
            collisions.len()
        );
    }

    Ok(CreatedBundle {
        header,
        ux: ux.entries,
        attached: attached_entries,
        collisions,
        external: layout.external,
    })
}
