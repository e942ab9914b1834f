// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Packages and the configs they declare.

use std::cell::{OnceCell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::backtrace::Backtrace;
use crate::statement::{
    ArchiveStatement, CommandStatement, ResourceStatement, RetrieveStatement, Statement,
};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./package_test.rs"]
mod package_test;

/// Config applied when none is named.
pub const DEFAULT_CONFIG: &str = "default";

/// A named, ordered list of statements belonging to a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub name: String,
    pub statements: Vec<Statement>,
}

impl Config {
    /// Create a config, rejecting statements that only make sense at the
    /// package level.
    pub fn new<S: Into<String>>(name: S, statements: Vec<Statement>) -> Result<Self> {
        let name = name.into();
        if let Some(stmt) = statements.iter().find(|s| !s.is_config_statement()) {
            return Err(Error::InvalidStatement(format!(
                "\"{stmt}\" is not allowed inside config \"{name}\""
            )));
        }
        Ok(Self { name, statements })
    }

    /// The command this config runs, if it declares one.
    pub fn command(&self) -> Option<&CommandStatement> {
        self.statements.iter().find_map(|stmt| match stmt {
            Statement::Command(command) => Some(command),
            _ => None,
        })
    }
}

/// A named, usually versioned unit with a directory and named configs.
///
/// Only the base package assembled from the command line or the working
/// directory lacks a name and version. Apart from the set of applied
/// configs and the backtrace it was resolved under, a package never
/// changes once loaded.
#[derive(Debug)]
pub struct Package {
    name: Option<String>,
    version: Option<String>,
    directory: PathBuf,
    configs: Vec<Config>,
    primary_config_name: Option<String>,
    statements: Vec<Statement>,
    applied_config_names: RefCell<BTreeSet<String>>,
    backtrace: OnceCell<Rc<Backtrace>>,
}

impl Package {
    pub fn new<P: Into<PathBuf>>(
        name: Option<String>,
        version: Option<String>,
        directory: P,
        configs: Vec<Config>,
    ) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for config in &configs {
            if !seen.insert(config.name.as_str()) {
                return Err(Error::InvalidStatement(format!(
                    "config \"{}\" is declared more than once",
                    config.name
                )));
            }
        }

        Ok(Self {
            name,
            version,
            directory: directory.into(),
            configs,
            primary_config_name: None,
            statements: Vec::new(),
            applied_config_names: RefCell::new(BTreeSet::new()),
            backtrace: OnceCell::new(),
        })
    }

    /// Set the config used when none is named.
    pub fn with_primary_config<S: Into<String>>(mut self, name: S) -> Self {
        self.primary_config_name = Some(name.into());
        self
    }

    /// Attach package-level statements (archives, resources, retrieves).
    pub fn with_statements(mut self, statements: Vec<Statement>) -> Result<Self> {
        if let Some(stmt) = statements.iter().find(|s| s.is_config_statement()) {
            return Err(Error::InvalidStatement(format!(
                "\"{stmt}\" must be declared inside a config"
            )));
        }
        self.statements = statements;
        Ok(self)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn primary_config_name(&self) -> Option<&str> {
        self.primary_config_name.as_deref()
    }

    /// The config used when a caller does not name one.
    pub fn effective_config_name(&self) -> &str {
        self.primary_config_name().unwrap_or(DEFAULT_CONFIG)
    }

    pub fn configs(&self) -> &[Config] {
        &self.configs
    }

    pub fn config_names(&self) -> Vec<&str> {
        self.configs.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn config(&self, name: &str) -> Result<&Config> {
        self.configs
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::UnknownConfig {
                package: self.to_string(),
                config: name.to_string(),
            })
    }

    pub fn retrieves(&self) -> impl Iterator<Item = &RetrieveStatement> {
        self.statements.iter().filter_map(|stmt| match stmt {
            Statement::Retrieve(retrieve) => Some(retrieve),
            _ => None,
        })
    }

    pub fn archives(&self) -> impl Iterator<Item = &ArchiveStatement> {
        self.statements.iter().filter_map(|stmt| match stmt {
            Statement::Archive(archive) => Some(archive),
            _ => None,
        })
    }

    pub fn resources(&self) -> impl Iterator<Item = &ResourceStatement> {
        self.statements.iter().filter_map(|stmt| match stmt {
            Statement::Resource(resource) => Some(resource),
            _ => None,
        })
    }

    pub fn has_applied_config(&self, name: &str) -> bool {
        self.applied_config_names.borrow().contains(name)
    }

    /// Record `name` as applied. Returns false if it already was.
    pub fn mark_config_applied(&self, name: &str) -> bool {
        self.applied_config_names
            .borrow_mut()
            .insert(name.to_string())
    }

    pub fn applied_config_names(&self) -> Vec<String> {
        self.applied_config_names.borrow().iter().cloned().collect()
    }

    /// Variables set or appended by the configs applied so far.
    pub fn applied_variable_names(&self) -> BTreeSet<String> {
        let applied = self.applied_config_names.borrow();
        self.configs
            .iter()
            .filter(|config| applied.contains(&config.name))
            .flat_map(|config| &config.statements)
            .filter_map(|stmt| match stmt {
                Statement::Set(set) => Some(set.name.clone()),
                Statement::Path(path) => Some(path.name.clone()),
                _ => None,
            })
            .collect()
    }

    /// The inclusion chain this package was first resolved under.
    pub fn backtrace(&self) -> Option<&Rc<Backtrace>> {
        self.backtrace.get()
    }

    /// Stamp the package with the chain it was resolved under. Only the
    /// first stamp sticks.
    pub fn set_backtrace(&self, backtrace: Rc<Backtrace>) -> bool {
        self.backtrace.set(backtrace).is_ok()
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_deref().unwrap_or("<unnamed>"))?;
        if let Some(version) = &self.version {
            write!(f, "/{version}")?;
        }
        Ok(())
    }
}
