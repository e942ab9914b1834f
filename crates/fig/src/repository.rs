// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Package repositories that the environment fetches packages from.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::definition::PackageDefinition;
use crate::package::Package;
use crate::{Error, Result, PACKAGE_FILENAME};

#[cfg(test)]
#[path = "./repository_test.rs"]
mod repository_test;

/// Name of the directory under the fig home that holds packages.
pub const REPOS_DIRECTORY: &str = "repos";

/// Source of packages by name and version.
pub trait Repository {
    /// Load a package, failing with [`Error::NotFound`] if the repository
    /// does not hold that version.
    fn get_package(&self, name: &str, version: &str) -> Result<Package>;
}

impl<R: Repository + ?Sized> Repository for Rc<R> {
    fn get_package(&self, name: &str, version: &str) -> Result<Package> {
        (**self).get_package(name, version)
    }
}

/// Packages laid out on disk as `<home>/repos/<name>/<version>/package.fig.yaml`.
#[derive(Debug, Clone)]
pub struct LocalRepository {
    home: PathBuf,
}

impl LocalRepository {
    pub fn new<P: Into<PathBuf>>(home: P) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn repos_dir(&self) -> PathBuf {
        self.home.join(REPOS_DIRECTORY)
    }

    /// Directory holding a single package version.
    pub fn package_dir(&self, name: &str, version: &str) -> PathBuf {
        self.repos_dir().join(name).join(version)
    }

    /// Every `(name, version)` present locally, sorted.
    pub fn list_packages(&self) -> Result<Vec<(String, String)>> {
        let repos = self.repos_dir();
        if !repos.is_dir() {
            return Ok(Vec::new());
        }

        let mut packages = Vec::new();
        for name_entry in std::fs::read_dir(&repos)? {
            let name_entry = name_entry?;
            if !name_entry.file_type()?.is_dir() {
                continue;
            }
            let name = name_entry.file_name().to_string_lossy().into_owned();
            for version_entry in std::fs::read_dir(name_entry.path())? {
                let version_entry = version_entry?;
                if version_entry.path().join(PACKAGE_FILENAME).is_file() {
                    let version = version_entry.file_name().to_string_lossy().into_owned();
                    packages.push((name.clone(), version));
                }
            }
        }
        packages.sort();
        Ok(packages)
    }
}

impl Repository for LocalRepository {
    fn get_package(&self, name: &str, version: &str) -> Result<Package> {
        let directory = self.package_dir(name, version);
        let definition_path = directory.join(PACKAGE_FILENAME);
        if !definition_path.is_file() {
            return Err(Error::NotFound {
                name: name.to_string(),
                version: version.to_string(),
            });
        }

        tracing::debug!("Loading {name}/{version} from {}", definition_path.display());
        let definition = PackageDefinition::load(&definition_path)?;
        let directory = dunce::canonicalize(&directory)?;
        definition.into_package(Some(name.to_string()), Some(version.to_string()), directory)
    }
}

/// Packages held in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    packages: BTreeMap<(String, String), (PathBuf, PackageDefinition)>,
    fetched: RefCell<Vec<String>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<N, V, P>(&mut self, name: N, version: V, directory: P, definition: PackageDefinition)
    where
        N: Into<String>,
        V: Into<String>,
        P: Into<PathBuf>,
    {
        self.packages
            .insert((name.into(), version.into()), (directory.into(), definition));
    }

    /// Add a package from YAML definition text.
    pub fn insert_yaml<N, V, P>(&mut self, name: N, version: V, directory: P, yaml: &str) -> Result<()>
    where
        N: Into<String>,
        V: Into<String>,
        P: Into<PathBuf>,
    {
        let definition = PackageDefinition::from_yaml(yaml)?;
        self.insert(name, version, directory, definition);
        Ok(())
    }

    /// `name/version` of every successful fetch, in order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }
}

impl Repository for MemoryRepository {
    fn get_package(&self, name: &str, version: &str) -> Result<Package> {
        let key = (name.to_string(), version.to_string());
        let (directory, definition) = self.packages.get(&key).ok_or_else(|| Error::NotFound {
            name: name.to_string(),
            version: version.to_string(),
        })?;
        let package = definition.clone().into_package(
            Some(name.to_string()),
            Some(version.to_string()),
            directory.clone(),
        )?;
        self.fetched.borrow_mut().push(format!("{name}/{version}"));
        Ok(package)
    }
}
