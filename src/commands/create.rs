use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use color_eyre::{
    Result,
    eyre::{WrapErr, eyre},
};
use owo_colors::OwoColorize;
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::{
    bundle::ContainerKind,
    commands::utils::{is_valid_file, is_valid_folder},
    config::EngineOptions,
    container::{ContainerBuilder, PayloadEntry},
    transfer::{FileTransfer, TransferMode},
    workflow::{BundleLayout, create_bundle},
};

/// Creates a bundle from an engine and folders of payloads
#[derive(Parser)]
pub struct Create {
    /// The engine executable the containers are appended to
    #[arg(long, value_parser = is_valid_file, value_hint = clap::ValueHint::FilePath)]
    engine: Utf8PathBuf,

    /// Folder whose files make up the UX container
    #[arg(long, value_parser = is_valid_folder, value_hint = clap::ValueHint::DirPath)]
    ux: Utf8PathBuf,

    /// Folder whose files make up the attached container
    #[arg(long, value_parser = is_valid_folder, value_hint = clap::ValueHint::DirPath)]
    attached: Option<Utf8PathBuf>,

    /// Payloads copied next to the bundle instead of into it
    #[arg(long, value_parser = is_valid_file, value_hint = clap::ValueHint::FilePath)]
    external: Vec<Utf8PathBuf>,

    /// The bundle's id. Defaults to a random GUID
    #[arg(long)]
    bundle_id: Option<Uuid>,

    /// Where the bundle is written
    #[arg(short, long, value_hint = clap::ValueHint::FilePath)]
    output: Utf8PathBuf,

    #[command(flatten)]
    options: EngineOptions,
}

impl Create {
    pub fn run(self) -> Result<()> {
        let bundle_id = self.bundle_id.unwrap_or_else(Uuid::new_v4);

        let layout = BundleLayout {
            ux: collect_container(ContainerKind::Ux, &self.ux)?,
            attached: self
                .attached
                .as_deref()
                .map(|folder| collect_container(ContainerKind::Attached, folder))
                .transpose()?,
            external: self
                .external
                .iter()
                .map(|path| external_transfer(path, &self.output))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .flatten()
                .collect(),
        };

        let created = create_bundle(&self.engine, &self.output, bundle_id, layout, &self.options)
            .wrap_err_with(|| format!("Failed to create {}", self.output))?;

        let mut stdout_lock = anstream::stdout().lock();
        writeln!(
            stdout_lock,
            "Created bundle {} at {}",
            created.header.bundle_id().blue(),
            self.output.green()
        )?;
        writeln!(
            stdout_lock,
            "UX container: {} payloads, {} bytes",
            created.ux.len(),
            created.header.ux_container_size()
        )?;
        if !created.attached.is_empty() {
            writeln!(
                stdout_lock,
                "Attached container: {} payloads, {} bytes",
                created.attached.len(),
                created.header.attached_container_size()
            )?;
        }
        for collision in &created.collisions {
            writeln!(stdout_lock, "{}: {collision}", "Warning".yellow())?;
        }
        for transfer in &created.external {
            writeln!(
                stdout_lock,
                "Copied {} to {}",
                transfer.source(),
                transfer.destination().green()
            )?;
        }

        Ok(())
    }
}

/// Adds every file under `folder` to a container, in file name order, at its path relative to
/// `folder`.
fn collect_container(kind: ContainerKind, folder: &Utf8Path) -> Result<ContainerBuilder> {
    let mut builder = ContainerBuilder::new(kind);

    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = Utf8Path::from_path(entry.path())
            .ok_or_else(|| eyre!("{} is not valid UTF-8", entry.path().display()))?;
        let relative = path.strip_prefix(folder)?;

        let payload = PayloadEntry::builder()
            .id(relative.as_str())
            .path(relative.as_str())
            .size(entry.metadata()?.len())
            .build();
        debug!(%path, "Adding payload to the {kind} container");

        builder
            .add_payload(payload, path.to_path_buf())
            .wrap_err_with(|| format!("Failed to add {path} to the {kind} container"))?;
    }

    Ok(builder)
}

fn external_transfer(path: &Utf8Path, output: &Utf8Path) -> Result<Option<FileTransfer>> {
    let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("{path} does not have a file name"))?;
    let destination = output
        .parent()
        .map_or_else(|| Utf8PathBuf::from(file_name), |parent| parent.join(file_name));

    Ok(FileTransfer::plan(path, destination, TransferMode::Copy))
}
