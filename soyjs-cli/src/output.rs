use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Error};
use tempfile::NamedTempFile;

pub const STDIN_STDOUT: &str = "-";

/// Where compiled output goes.
///
/// Files are written to a temporary file in the target directory and moved
/// into place on [`commit`](Output::commit) so a failed run never leaves a
/// half written file behind.
pub enum Output {
    Stdout(io::Stdout),
    File { target: PathBuf, temp: NamedTempFile },
}

impl Output {
    pub fn new(filename: &Path) -> Result<Output, Error> {
        if filename == Path::new(STDIN_STDOUT) {
            return Ok(Output::Stdout(io::stdout()));
        }
        let target = std::env::current_dir()?.join(filename);
        let dir = target
            .parent()
            .ok_or_else(|| anyhow!("cannot write to root"))?;
        let temp = NamedTempFile::new_in(dir)
            .with_context(|| format!("unable to create output in '{}'", dir.display()))?;
        Ok(Output::File { target, temp })
    }

    pub fn commit(self) -> Result<(), Error> {
        match self {
            Output::Stdout(mut out) => out.flush()?,
            Output::File { target, temp } => {
                temp.persist(&target)
                    .with_context(|| format!("unable to write '{}'", target.display()))?;
                tracing::debug!(path = %target.display(), "wrote output");
            }
        }
        Ok(())
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(out) => out.write(buf),
            Output::File { temp, .. } => temp.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(out) => out.flush(),
            Output::File { temp, .. } => temp.flush(),
        }
    }
}
