//! Writes a default TOML configuration scaffold.

use std::fmt;
use std::path::PathBuf;

use clap::Args;

use crate::config::ConfigFile;

#[derive(Debug, Args)]
pub struct GenerateArgs {
    /// The output path for the TOML configuration file
    #[arg(long, default_value = "./config.toml")]
    pub output_path: PathBuf,
}

#[derive(Debug)]
pub enum GenerateError {
    MissingOutputPath,
    Encode(toml::ser::Error),
    Write(std::io::Error),
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingOutputPath => write!(f, "output path not set"),
            Self::Encode(e) => write!(f, "unable to encode config: {}", e),
            Self::Write(e) => write!(f, "unable to write output file: {}", e),
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MissingOutputPath => None,
            Self::Encode(e) => Some(e),
            Self::Write(e) => Some(e),
        }
    }
}

/// Serializes the default configuration and writes it to the output path.
pub fn run(args: &GenerateArgs) -> Result<(), GenerateError> {
    if args.output_path.as_os_str().is_empty() {
        return Err(GenerateError::MissingOutputPath);
    }

    let encoded =
        toml::to_string_pretty(&ConfigFile::default()).map_err(GenerateError::Encode)?;
    std::fs::write(&args.output_path, encoded).map_err(GenerateError::Write)?;

    Ok(())
}
