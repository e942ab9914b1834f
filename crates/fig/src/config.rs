// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Locations fig reads from and writes to.

use std::path::{Path, PathBuf};

use crate::repository::LocalRepository;
use crate::retriever::Retriever;
use crate::{Error, Result, PACKAGE_FILENAME};

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

/// Environment variable naming the fig home.
pub const FIG_HOME_VAR: &str = "FIG_HOME";

/// Directory under the user's home used when `FIG_HOME` is unset.
pub const DEFAULT_HOME_DIRNAME: &str = ".fighome";

/// Resolved locations for a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root of the local package repository.
    pub home: PathBuf,

    /// Directory that retrieved files are copied into.
    pub working_dir: PathBuf,

    /// Package definition read from the working directory, if any.
    pub package_file: Option<PathBuf>,
}

impl Settings {
    /// Resolve settings, filling anything not given from the process
    /// environment.
    ///
    /// `package_file` is taken relative to the working directory. Pass
    /// `use_package_file = false` to ignore the working directory's
    /// definition entirely.
    pub fn resolve(
        home: Option<PathBuf>,
        working_dir: Option<PathBuf>,
        package_file: Option<PathBuf>,
        use_package_file: bool,
    ) -> Result<Self> {
        let home = match home {
            Some(home) => home,
            None => default_home()?,
        };
        let working_dir = match working_dir {
            Some(dir) => dir,
            None => std::env::current_dir()?,
        };
        let package_file = use_package_file
            .then(|| working_dir.join(package_file.unwrap_or_else(|| PACKAGE_FILENAME.into())));

        tracing::debug!("Using fig home {}", home.display());
        Ok(Self {
            home,
            working_dir,
            package_file,
        })
    }

    pub fn repository(&self) -> LocalRepository {
        LocalRepository::new(&self.home)
    }

    /// Open the retrieval tracker for the working directory.
    pub fn retriever(&self) -> Result<Retriever> {
        Retriever::new(&self.working_dir)
    }

    /// The package file, if one is configured and exists.
    pub fn existing_package_file(&self) -> Option<&Path> {
        self.package_file.as_deref().filter(|path| path.is_file())
    }
}

/// `$FIG_HOME`, or `~/.fighome`.
pub fn default_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(FIG_HOME_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    let user_home = dirs::home_dir().ok_or_else(|| {
        Error::Internal(format!(
            "cannot determine the home directory; set {FIG_HOME_VAR}"
        ))
    })?;
    Ok(user_home.join(DEFAULT_HOME_DIRNAME))
}
