use std::fmt;
use std::path::PathBuf;

use crate::{InvokeError, Result};

const SHELL_PREFIX: &str = "cmd:";

/// Where a collaborator lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// `http://…` or `https://…`: the input is POSTed as a JSON body.
    Http(String),
    /// `cmd:<shell command>`: run through `sh -c`.
    Shell(String),
    /// Anything else: an executable path or a name resolved on `PATH`.
    Program(PathBuf),
}

impl Address {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(InvokeError::InvalidAddress(raw.to_string()));
        }
        if raw.starts_with("http://") || raw.starts_with("https://") {
            return Ok(Self::Http(raw.to_string()));
        }
        if let Some(command) = raw.strip_prefix(SHELL_PREFIX) {
            let command = command.trim();
            if command.is_empty() {
                return Err(InvokeError::InvalidAddress(raw.to_string()));
            }
            return Ok(Self::Shell(command.to_string()));
        }
        Ok(Self::Program(PathBuf::from(raw)))
    }

    /// The executable that must exist for this address to be callable, if any.
    pub fn program(&self) -> Option<&std::path::Path> {
        match self {
            Self::Program(p) => Some(p.as_path()),
            Self::Http(_) | Self::Shell(_) => None,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(url) => f.write_str(url),
            Self::Shell(command) => write!(f, "{SHELL_PREFIX}{command}"),
            Self::Program(path) => write!(f, "{}", path.display()),
        }
    }
}
