// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Builds and applies the environment shared by the environment commands.

use std::rc::Rc;

use fig::{
    Config, ConfigDefinition, Environment, IncludeStatement, Package, PackageDefinition,
    PackageDescriptor, PathStatement, SetStatement, Settings, Statement, DEFAULT_CONFIG,
};
use miette::Result;

use crate::EnvironmentFlags;

/// An applied environment together with the package it started from.
pub struct Session {
    pub environment: Environment,
    pub base: Rc<Package>,
    pub config_name: String,
}

impl Session {
    /// Descriptor for the config whose command `fig run` executes.
    pub fn command_descriptor(&self, flags: &EnvironmentFlags) -> Result<PackageDescriptor> {
        match &flags.descriptor {
            Some(raw) => {
                let mut descriptor: PackageDescriptor = raw.parse()?;
                if descriptor.config.is_none() {
                    descriptor.config = flags.config.clone();
                }
                Ok(descriptor)
            }
            None => Ok(PackageDescriptor {
                config: Some(self.config_name.clone()),
                ..Default::default()
            }),
        }
    }
}

/// Assemble the base package, apply it and persist what was retrieved.
pub fn load(settings: &Settings, flags: &EnvironmentFlags) -> Result<Session> {
    let (base, config_name) = base_package(settings, flags)?;

    let mut environment = Environment::new(
        Box::new(settings.repository()),
        None,
        settings.retriever()?,
    );
    environment.add_retrieves_from(&base);

    let base = Rc::new(base);
    environment.apply_config(&base, &config_name, None)?;
    environment.save_retrieves()?;

    Ok(Session {
        environment,
        base,
        config_name,
    })
}

/// The unnamed package a run starts from, and the config to apply.
///
/// A descriptor on the command line wins over the working directory's
/// package file. Statements given with `--include`, `--set` and `--append`
/// come last, in that order, so they take precedence over everything the
/// package applies.
pub fn base_package(settings: &Settings, flags: &EnvironmentFlags) -> Result<(Package, String)> {
    let cli_statements = command_line_statements(flags)?;

    if let Some(raw) = &flags.descriptor {
        let mut descriptor: PackageDescriptor = raw.parse()?;
        if descriptor.config.is_none() {
            descriptor.config = flags.config.clone();
        }
        let mut statements = vec![Statement::Include(IncludeStatement::new(
            descriptor,
            Vec::new(),
        ))];
        statements.extend(cli_statements);
        let config = Config::new(DEFAULT_CONFIG, statements)?;
        let package = Package::new(None, None, &settings.working_dir, vec![config])?;
        return Ok((package, DEFAULT_CONFIG.to_string()));
    }

    if let Some(path) = settings.existing_package_file() {
        tracing::debug!("Using package file {}", path.display());
        let mut definition = PackageDefinition::load(path)?;
        let config_name = flags
            .config
            .clone()
            .or_else(|| definition.primary_config.clone())
            .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
        if !cli_statements.is_empty() {
            match definition.configs.iter_mut().find(|c| c.name == config_name) {
                Some(config) => config.statements.extend(cli_statements),
                None => definition.configs.push(ConfigDefinition {
                    name: config_name.clone(),
                    statements: cli_statements,
                }),
            }
        }
        let package = definition.into_package(None, None, &settings.working_dir)?;
        return Ok((package, config_name));
    }

    let config_name = flags
        .config
        .clone()
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = Config::new(config_name.clone(), cli_statements)?;
    let package = Package::new(None, None, &settings.working_dir, vec![config])?;
    Ok((package, config_name))
}

fn command_line_statements(flags: &EnvironmentFlags) -> Result<Vec<Statement>> {
    let mut statements = Vec::new();
    for raw in &flags.include {
        let descriptor: PackageDescriptor = raw.parse()?;
        statements.push(Statement::Include(IncludeStatement::new(
            descriptor,
            Vec::new(),
        )));
    }
    for raw in &flags.set {
        let (name, value) = split_assignment(raw)?;
        statements.push(Statement::Set(SetStatement { name, value }));
    }
    for raw in &flags.append {
        let (name, value) = split_assignment(raw)?;
        statements.push(Statement::Path(PathStatement { name, value }));
    }
    Ok(statements)
}

fn split_assignment(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(miette::miette!(
            "Invalid assignment \"{raw}\", expected VAR=VALUE"
        )),
    }
}
