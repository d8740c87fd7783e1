use crate::error::ShellError;
use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Process-wide state visible to every stage the shell dispatches.
///
/// The environment contains:
/// - `vars`: environment variables handed to external commands (`PATH` is looked up here).
/// - `current_dir`: the working directory read by `pwd`, written by `cd`, and used as the
///   working directory of every spawned process.
///
/// The shell never calls `std::env::set_current_dir`; the directory lives here so it can be
/// injected and inspected directly. A background job gets its own copy when the process is
/// duplicated, so a `cd` there never reaches the parent.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state.
    ///
    /// Fails with [`ShellError::Environment`] if the process working directory cannot be read.
    pub fn new() -> Result<Self, ShellError> {
        let current_dir = stdenv::current_dir().map_err(ShellError::Environment)?;
        Ok(Self::with_current_dir(current_dir))
    }

    /// Same as [`Environment::new`] but starting in `current_dir`.
    pub fn with_current_dir(current_dir: impl Into<PathBuf>) -> Self {
        Self {
            // variables that are not valid UTF-8 are left out; children still inherit them
            vars: stdenv::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
            current_dir: current_dir.into(),
        }
    }

    /// Get the value of an environment variable.
    pub fn get_var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }
}
