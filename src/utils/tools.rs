use std::ffi::OsStr;
use std::process::Command;

/// Failure running one of the external poppler/tesseract binaries.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("{tool} could not be started: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    Failed {
        tool: &'static str,
        status: String,
        stderr: String,
    },
}

/// An external command-line tool located through `PATH`.
#[derive(Debug, Clone, Copy)]
pub struct ExternalTool {
    pub name: &'static str,
    version_flag: &'static str,
}

pub const PDFTOTEXT: ExternalTool = ExternalTool::new("pdftotext", "-v");
pub const PDFTOPPM: ExternalTool = ExternalTool::new("pdftoppm", "-v");
pub const TESSERACT: ExternalTool = ExternalTool::new("tesseract", "--version");

impl ExternalTool {
    pub const fn new(name: &'static str, version_flag: &'static str) -> Self {
        Self { name, version_flag }
    }

    /// True when the binary can be spawned at all.
    pub fn is_available(&self) -> bool {
        Command::new(self.name)
            .arg(self.version_flag)
            .output()
            .is_ok()
    }

    /// Run the tool and return its stdout, lossily decoded.
    pub fn run<I, S>(&self, args: I) -> Result<String, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = Command::new(self.name)
            .args(args)
            .output()
            .map_err(|source| ToolError::Spawn {
                tool: self.name,
                source,
            })?;

        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: self.name,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
