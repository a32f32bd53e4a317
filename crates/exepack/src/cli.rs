use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use exepack_export::{ExportOptions, ExportOutcome, ExportPipeline, PipelineConfig};

use crate::spool::spool;

/// Input argument that reads the archive from standard input.
const STDIN: &str = "-";

/// Convert a project archive into a publishing format.
#[derive(Debug, clap::Parser)]
#[command(name = "exepack", version)]
pub struct Cli {
    /// Project archive, or `-` for standard input.
    pub input: String,

    /// Directory the result is published into.
    pub output: PathBuf,

    /// elpx, html5, html5-sp, scorm12, scorm2004, ims or epub3.
    pub format: Option<String>,

    /// Verbose logging.
    #[arg(long)]
    pub debug: bool,

    /// Absolute URL the published site will be served from.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Configuration file (default `exepack.toml` if present).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base name of the published file or directory.
    #[arg(long, value_name = "NAME")]
    pub keep_name: Option<String>,

    /// Zip the HTML formats instead of publishing a directory.
    #[arg(long)]
    pub package: bool,
}

impl Cli {
    pub fn run(self) -> Result<ExitCode> {
        let mut config = PipelineConfig::load(self.config.as_deref()).context("loading configuration")?;
        if self.base_url.is_some() {
            config.base_url = self.base_url.clone();
        }
        if let Ok(effective) = config.to_toml() {
            tracing::debug!("effective configuration:\n{effective}");
        }

        let format = self
            .format
            .clone()
            .unwrap_or_else(|| config.default_format.to_string());
        let mut options = ExportOptions {
            name: self.keep_name.clone(),
            base_url: None,
            package: self.package,
        };

        let spooled = if self.input == STDIN {
            options.name.get_or_insert_with(|| "export".to_string());
            Some(spool(&mut std::io::stdin().lock(), &config.workspace_root)?)
        } else {
            None
        };
        let input = spooled
            .as_ref()
            .map_or_else(|| Path::new(&self.input), |file| file.path());

        let pipeline = ExportPipeline::new(config);
        match pipeline.run(input, &self.output, &format, &options)? {
            ExportOutcome::Exported(output) => {
                for warning in &output.warnings {
                    tracing::warn!("{warning}");
                }
                println!("{}", output.path.display());
                Ok(ExitCode::SUCCESS)
            }
            ExportOutcome::Failed(failure) => {
                eprintln!("error: {}", failure.message);
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn positionals_and_flags() {
        let cli = Cli::try_parse_from([
            "exepack",
            "-",
            "out",
            "scorm2004",
            "--debug",
            "--base-url",
            "https://example.org",
            "--keep-name",
            "course",
        ])
        .unwrap();
        assert_eq!(cli.input, STDIN);
        assert_eq!(cli.output, PathBuf::from("out"));
        assert_eq!(cli.format.as_deref(), Some("scorm2004"));
        assert!(cli.debug);
        assert_eq!(cli.keep_name.as_deref(), Some("course"));
    }

    #[test]
    fn format_is_optional() {
        let cli = Cli::try_parse_from(["exepack", "in.elp", "out"]).unwrap();
        assert!(cli.format.is_none());
        assert!(!cli.package);
        assert!(Cli::try_parse_from(["exepack", "in.elp"]).is_err());
    }
}
