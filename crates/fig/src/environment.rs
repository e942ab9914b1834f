// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! The environment engine: applies package configs to a variable mapping.

use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use crate::ambient::AmbientEnvironment;
use crate::backtrace::Backtrace;
use crate::descriptor::PackageDescriptor;
use crate::expand::{expand_command_line_argument, expand_path};
use crate::package::{Package, DEFAULT_CONFIG};
use crate::repository::Repository;
use crate::retriever::{join_relative, relative_path, Retriever};
use crate::statement::{CommandStatement, IncludeStatement, Statement};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./environment_test.rs"]
mod environment_test;

/// Variable name to value.
pub type Variables = BTreeMap<String, String>;

/// Separator placed between entries of path-like variables.
pub const PATH_SEPARATOR: &str = if cfg!(windows) { ";" } else { ":" };

/// Marker in retrieved values: everything after the last `//` is kept as a
/// sub-path below the retrieve destination.
const PRESERVE_MARKER: &str = "//";

/// Token in retrieve destinations replaced by the package name.
const PACKAGE_TOKEN: &str = "[package]";

/// Owns the variables and resolved packages of a single run.
///
/// A package name denotes exactly one version for the lifetime of an
/// environment. Includes asking for another version fail unless an override
/// declared further up the inclusion chain picks the version first.
pub struct Environment {
    repository: Box<dyn Repository>,
    variables: Variables,
    retrieve_vars: BTreeMap<String, String>,
    packages: BTreeMap<String, Rc<Package>>,
    retriever: Retriever,
}

impl Environment {
    /// Create an environment starting from `variables_override`, or from the
    /// process environment when none is given.
    pub fn new(
        repository: Box<dyn Repository>,
        variables_override: Option<Variables>,
        retriever: Retriever,
    ) -> Self {
        Self {
            repository,
            variables: variables_override.unwrap_or_else(system_variables),
            retrieve_vars: BTreeMap::new(),
            packages: BTreeMap::new(),
            retriever,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// A copy of every variable.
    pub fn variables(&self) -> Variables {
        self.variables.clone()
    }

    /// Copy values of `name` into the working directory at `path` whenever
    /// it is set or appended to. `path` may contain `[package]`.
    pub fn add_retrieve<N: Into<String>, P: Into<String>>(&mut self, name: N, path: P) {
        self.retrieve_vars.insert(name.into(), path.into());
    }

    /// Register every retrieve declared by `package`.
    pub fn add_retrieves_from(&mut self, package: &Package) {
        for retrieve in package.retrieves() {
            self.add_retrieve(retrieve.variable.clone(), retrieve.path.clone());
        }
    }

    pub fn register_package(&mut self, package: Package) -> Result<Rc<Package>> {
        let Some(name) = package.name().map(str::to_string) else {
            return Err(Error::Internal(
                "cannot register a package without a name".to_string(),
            ));
        };
        if self.packages.contains_key(&name) {
            tracing::error!("There is already a package with the name \"{name}\"");
            return Err(Error::DuplicateName(name));
        }

        let package = Rc::new(package);
        self.packages.insert(name, Rc::clone(&package));
        Ok(package)
    }

    pub fn get_package(&self, name: &str) -> Option<&Rc<Package>> {
        self.packages.get(name)
    }

    /// Resolved packages, ordered by name.
    pub fn packages(&self) -> impl Iterator<Item = &Rc<Package>> {
        self.packages.values()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Persist the retrieval manifest.
    pub fn save_retrieves(&self) -> Result<()> {
        self.retriever.save()
    }

    /// The primary config of a resolved package, or the default.
    pub fn config_name_for(&self, package_name: &str) -> &str {
        self.get_package(package_name)
            .and_then(|p| p.primary_config_name())
            .unwrap_or(DEFAULT_CONFIG)
    }

    /// Apply one config of `package`. Applying the same config of the same
    /// package again is a no-op.
    pub fn apply_config(
        &mut self,
        package: &Rc<Package>,
        config_name: &str,
        backtrace: Option<&Rc<Backtrace>>,
    ) -> Result<()> {
        if package.has_applied_config(config_name) {
            return Ok(());
        }
        let config = package.config(config_name)?;
        package.mark_config_applied(config_name);

        tracing::debug!("Applying {package}:{config_name}");
        for statement in &config.statements {
            self.apply_config_statement(package, statement, backtrace)?;
        }
        Ok(())
    }

    fn apply_config_statement(
        &mut self,
        package: &Rc<Package>,
        statement: &Statement,
        backtrace: Option<&Rc<Backtrace>>,
    ) -> Result<()> {
        tracing::trace!("[{package}] {statement}");
        match statement {
            Statement::Path(stmt) => self.append_variable(package, &stmt.name, &stmt.value),
            Statement::Set(stmt) => self.set_variable(package, &stmt.name, &stmt.value),
            Statement::Include(stmt) => self.include_config(package, stmt, backtrace),
            // Commands are only read when one is executed.
            Statement::Command(_) => Ok(()),
            Statement::Archive(_) | Statement::Resource(_) | Statement::Retrieve(_) => Err(
                Error::Internal(format!("unexpected statement in config: {statement}")),
            ),
        }
    }

    fn include_config(
        &mut self,
        base: &Rc<Package>,
        include: &IncludeStatement,
        backtrace: Option<&Rc<Backtrace>>,
    ) -> Result<()> {
        let package_name = include
            .package_name
            .as_deref()
            .or(base.name())
            .map(str::to_string);

        let mut version_name = include.version_name.clone();
        if let (Some(frame), Some(name)) = (backtrace, package_name.as_deref()) {
            if let Some(forced) = frame.get_override(name) {
                tracing::debug!("Override forces {name}/{forced}");
                version_name = Some(forced.to_string());
            }
        }

        let new_backtrace = Rc::new(Backtrace::new(
            backtrace.cloned(),
            PackageDescriptor {
                name: package_name.clone(),
                config: include.config_name.clone(),
                version: version_name.clone(),
            },
            &include.overrides,
        ));

        let package = match package_name.as_deref() {
            Some(name) if include.package_name.is_some() || self.packages.contains_key(name) => {
                self.lookup_package(name, version_name.as_deref(), &new_backtrace)?
            }
            // A config of the base package itself, which was never registered.
            _ => Rc::clone(base),
        };

        let config_name = include
            .config_name
            .clone()
            .unwrap_or_else(|| package.effective_config_name().to_string());
        self.apply_config(&package, &config_name, Some(&new_backtrace))
    }

    fn lookup_package(
        &mut self,
        name: &str,
        version: Option<&str>,
        backtrace: &Rc<Backtrace>,
    ) -> Result<Rc<Package>> {
        if let Some(package) = self.packages.get(name) {
            if let Some(requested) = version {
                if package.version() != Some(requested) {
                    let backtraces = conflict_report(name, requested, backtrace, package);
                    tracing::error!("Version mismatch: {name}{backtraces}");
                    return Err(Error::VersionConflict {
                        package: name.to_string(),
                        backtraces,
                    });
                }
            }
            return Ok(Rc::clone(package));
        }

        let Some(version) = version else {
            tracing::error!("No version specified for {name}");
            return Err(Error::MissingVersion(name.to_string()));
        };

        tracing::debug!("Resolving {name}/{version}");
        let package = self.repository.get_package(name, version)?;
        package.set_backtrace(Rc::clone(backtrace));
        let package = Rc::new(package);
        self.packages.insert(name.to_string(), Rc::clone(&package));
        Ok(package)
    }

    /// Run the command of a package config with this environment exported.
    ///
    /// The package defaults to the base package's name, the config to the
    /// package's primary config. `args` are appended to the command.
    pub fn execute_config<T, F>(
        &mut self,
        base: &Rc<Package>,
        descriptor: &PackageDescriptor,
        args: &[String],
        runner: F,
    ) -> Result<T>
    where
        F: FnOnce(Vec<String>) -> Result<T>,
    {
        let backtrace = Rc::new(Backtrace::root(descriptor.clone()));
        let package = match descriptor.name.as_deref().or(base.name()) {
            Some(name) if descriptor.name.is_some() || self.packages.contains_key(name) => {
                self.lookup_package(name, descriptor.version.as_deref(), &backtrace)?
            }
            _ => Rc::clone(base),
        };

        let config_name = descriptor
            .config
            .clone()
            .unwrap_or_else(|| package.effective_config_name().to_string());
        let config = package.config(&config_name)?;
        let Some(command) = config.command() else {
            return Err(Error::NoCommand {
                package: package.to_string(),
                config: config_name,
            });
        };

        let argv = self.expand_command(command, args, &package)?;
        if argv.is_empty() {
            return Err(Error::NoCommand {
                package: package.to_string(),
                config: config_name,
            });
        }

        let _ambient = AmbientEnvironment::apply(&self.variables);
        runner(argv)
    }

    /// Run a literal command with this environment exported. Each argument
    /// is expanded on its own; `@name` refers to resolved packages.
    pub fn execute_shell<T, F>(&self, command: &[String], runner: F) -> Result<T>
    where
        F: FnOnce(Vec<String>) -> Result<T>,
    {
        let argv = command
            .iter()
            .map(|arg| {
                expand_command_line_argument(arg, None, |name| self.package_directory(name))
            })
            .collect::<Result<Vec<_>>>()?;

        let _ambient = AmbientEnvironment::apply(&self.variables);
        runner(argv)
    }

    fn expand_command(
        &self,
        command: &CommandStatement,
        args: &[String],
        package: &Package,
    ) -> Result<Vec<String>> {
        let line = std::iter::once(&command.command)
            .chain(&command.args)
            .chain(args)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        let directory = package.directory().to_string_lossy();
        let expanded = expand_command_line_argument(&line, Some(directory.as_ref()), |name| {
            self.package_directory(name)
        })?;
        Ok(expanded.split_whitespace().map(str::to_string).collect())
    }

    fn package_directory(&self, name: &str) -> Option<String> {
        self.packages
            .get(name)
            .map(|p| p.directory().to_string_lossy().into_owned())
    }

    fn set_variable(&mut self, package: &Package, name: &str, value: &str) -> Result<()> {
        let value = self.expand_and_retrieve_variable_value(package, name, value)?;
        self.variables.insert(name.to_string(), value);
        Ok(())
    }

    /// Prepend onto an existing variable, matching its name without regard
    /// to ASCII case.
    fn append_variable(&mut self, package: &Package, name: &str, value: &str) -> Result<()> {
        let value = self.expand_and_retrieve_variable_value(package, name, value)?;
        let existing = if self.variables.contains_key(name) {
            Some(name.to_string())
        } else {
            self.variables
                .keys()
                .find(|key| key.eq_ignore_ascii_case(name))
                .cloned()
        };

        match existing {
            Some(key) => {
                let previous = self.variables.get(&key).cloned().unwrap_or_default();
                self.variables
                    .insert(key, format!("{value}{PATH_SEPARATOR}{previous}"));
            }
            None => {
                self.variables.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// Expand `@` to the package directory and, for retrieved variables,
    /// copy the referenced file into the working directory and use the
    /// copy's relative path instead.
    fn expand_and_retrieve_variable_value(
        &mut self,
        package: &Package,
        name: &str,
        value: &str,
    ) -> Result<String> {
        let Some(package_name) = package.name() else {
            return Ok(value.to_string());
        };

        let file = expand_path(value, &package.directory().to_string_lossy())?;
        let Some(template) = self.retrieve_vars.get(name) else {
            return Ok(file);
        };
        let destination = template.replace(PACKAGE_TOKEN, package_name);

        let target = match preserved_path(&file) {
            Some(preserved) => join_relative(&destination, preserved),
            None => {
                let source = Path::new(&file);
                match source.file_name() {
                    Some(base_name) if !source.is_dir() => {
                        join_relative(&destination, &base_name.to_string_lossy())
                    }
                    _ => destination,
                }
            }
        };
        let target = relative_path(&target)?;

        self.retriever
            .with_package_config(package.name(), package.version(), |retriever| {
                retriever.retrieve(Path::new(&file), &target)
            })?;
        Ok(target)
    }
}

/// The part of `file` after its last `//`, if anything follows it.
fn preserved_path(file: &str) -> Option<&str> {
    let mut parts: Vec<&str> = file.split(PRESERVE_MARKER).collect();
    while parts.len() > 1 && parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    match parts.as_slice() {
        [_, .., last] => Some(*last),
        _ => None,
    }
}

fn conflict_report(
    name: &str,
    requested: &str,
    requested_at: &Backtrace,
    registered: &Package,
) -> String {
    let mut report = format!("\n{name}/{requested} requested by:\n{}", requested_at.dump());
    if let Some(original) = registered.backtrace() {
        report.push_str(&format!("{registered} resolved by:\n{}", original.dump()));
    }
    report.trim_end().to_string()
}

fn system_variables() -> Variables {
    std::env::vars_os()
        .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
        .collect()
}
