use std::{
    io,
    process::{Command, ExitStatus},
};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{program} failed to sign {engine} ({status})")]
    Failed {
        program: Utf8PathBuf,
        engine: Utf8PathBuf,
        status: ExitStatus,
    },
    #[error("Failed to sign {engine}: {reason}")]
    Rejected { engine: Utf8PathBuf, reason: String },
}

/// Signs a detached engine in place.
pub trait EngineSigner {
    fn sign(&self, engine: &Utf8Path) -> Result<(), SigningError>;
}

impl<F> EngineSigner for F
where
    F: Fn(&Utf8Path) -> Result<(), SigningError>,
{
    fn sign(&self, engine: &Utf8Path) -> Result<(), SigningError> {
        self(engine)
    }
}

/// An external signing program, invoked with its arguments followed by the engine's path.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SignTool {
    program: Utf8PathBuf,
    args: Vec<String>,
}

impl SignTool {
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<Utf8PathBuf>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl EngineSigner for SignTool {
    fn sign(&self, engine: &Utf8Path) -> Result<(), SigningError> {
        info!("Signing {engine} with {}", self.program);

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(engine)
            .status()
            .map_err(|source| SigningError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(SigningError::Failed {
                program: self.program.clone(),
                engine: engine.to_path_buf(),
                status,
            });
        }

        Ok(())
    }
}
