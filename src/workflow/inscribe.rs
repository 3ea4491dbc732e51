use std::{fs, io};

use camino::Utf8Path;
use tempfile::NamedTempFile;
use tracing::info;

use super::WorkflowError;
use crate::{
    bundle::{BundleError, BundleReader, BundleWriter, ContainerHeader, persist_temp_file},
    config::EngineOptions,
    signing::EngineSigner,
};

/// Writes the engine of `bundle` to `engine_output` so it can be signed separately.
pub fn detach_engine(
    bundle: &Utf8Path,
    engine_output: &Utf8Path,
    options: &EngineOptions,
) -> Result<ContainerHeader, BundleError> {
    let mut reader = BundleReader::open(bundle)?;

    let intermediate_folder = options.intermediate_folder_for(engine_output);
    fs::create_dir_all(&intermediate_folder)?;
    let mut engine = NamedTempFile::new_in(&intermediate_folder)?;

    BundleWriter::copy_engine_out_of(&mut reader, engine.as_file_mut())?;
    persist_temp_file(engine, engine_output)?;

    let header = *reader.header();
    reader.close();

    info!("Detached the engine of {bundle} to {engine_output}");

    Ok(header)
}

/// Writes `signed_engine` followed by the containers and container header of `bundle` to
/// `output`.
pub fn reattach_engine(
    bundle: &Utf8Path,
    signed_engine: &Utf8Path,
    output: &Utf8Path,
    options: &EngineOptions,
) -> Result<ContainerHeader, BundleError> {
    let mut original = BundleReader::open(bundle)?;

    let header = BundleWriter::create(
        signed_engine,
        output,
        &options.intermediate_folder_for(output),
    )?
    .reattach_containers(&mut original)?;

    original.close();

    Ok(header)
}

/// Detaches the engine of `bundle`, has `signer` sign it in place and reattaches the original
/// containers behind it in `output`.
pub fn inscribe_bundle<S: EngineSigner + ?Sized>(
    bundle: &Utf8Path,
    output: &Utf8Path,
    signer: &S,
    options: &EngineOptions,
) -> Result<ContainerHeader, WorkflowError> {
    let mut original = BundleReader::open(bundle)?;

    let intermediate_folder = options.intermediate_folder_for(output);
    fs::create_dir_all(&intermediate_folder)?;
    let mut engine = tempfile::Builder::new()
        .prefix("engine")
        .suffix(".exe")
        .tempfile_in(&intermediate_folder)?;

    BundleWriter::copy_engine_out_of(&mut original, engine.as_file_mut())?;

    // The signer gets the path only, with our handle closed
    let engine = engine.into_temp_path();
    let engine_path = Utf8Path::from_path(&engine).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("{} is not valid UTF-8", engine.display()),
        )
    })?;

    signer.sign(engine_path)?;

    let header = BundleWriter::create(engine_path, output, &intermediate_folder)?
        .reattach_containers(&mut original)?;

    original.close();

    info!("Inscribed {bundle} into {output}");

    Ok(header)
}
