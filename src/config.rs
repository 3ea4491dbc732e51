use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;

use crate::container::{CabinetCodec, Compression};

/// Settings shared by every command that reads or writes a bundle.
#[derive(Args, Clone, Debug, Default, Eq, PartialEq)]
pub struct EngineOptions {
    /// Folder for temporary files. Defaults to the folder of the file being written
    #[arg(long, env = "BURN_INTERMEDIATE_DIR", value_hint = clap::ValueHint::DirPath)]
    pub intermediate_folder: Option<Utf8PathBuf>,

    /// Compression used for payloads marked as compressed
    #[arg(long, env = "BURN_COMPRESSION", value_enum, default_value_t)]
    pub compression: Compression,
}

impl EngineOptions {
    /// Returns the folder temporary files for `output` are created in.
    pub fn intermediate_folder_for(&self, output: &Utf8Path) -> Utf8PathBuf {
        self.intermediate_folder.clone().unwrap_or_else(|| {
            output
                .parent()
                .filter(|parent| !parent.as_str().is_empty())
                .map_or_else(|| Utf8PathBuf::from("."), Utf8Path::to_path_buf)
        })
    }

    #[inline]
    pub const fn codec(&self) -> CabinetCodec {
        CabinetCodec::new(self.compression)
    }
}
