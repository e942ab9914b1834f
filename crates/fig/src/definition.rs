// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Package definition files (`package.fig.yaml`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::package::{Config, Package};
use crate::statement::{ArchiveStatement, ResourceStatement, RetrieveStatement, Statement};

#[cfg(test)]
#[path = "./definition_test.rs"]
mod definition_test;

/// API version for definition files.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub enum ApiVersion {
    #[default]
    #[serde(rename = "fig/v0")]
    V0,
}

/// Helper for two-stage deserialization to determine API version first.
#[derive(Deserialize)]
struct ApiVersionMapping {
    #[serde(default)]
    api: ApiVersion,
}

/// One config as written in a definition file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigDefinition {
    pub name: String,

    #[serde(default)]
    pub statements: Vec<Statement>,
}

/// Parsed contents of a package definition file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageDefinition {
    /// API version identifier.
    #[serde(default)]
    pub api: ApiVersion,

    /// Optional human-readable description.
    #[serde(default)]
    pub description: Option<String>,

    /// Config used when none is named.
    #[serde(default)]
    pub primary_config: Option<String>,

    /// Variables whose values are copied into the working directory,
    /// mapped to the destination (may contain `[package]`).
    #[serde(default)]
    pub retrieves: BTreeMap<String, String>,

    /// Files that are part of the package.
    #[serde(default)]
    pub resources: Vec<String>,

    /// Archives that are part of the package.
    #[serde(default)]
    pub archives: Vec<String>,

    #[serde(default)]
    pub configs: Vec<ConfigDefinition>,

    /// Path to the file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl PackageDefinition {
    /// Parse a definition from YAML.
    pub fn from_yaml<S: Into<String>>(yaml: S) -> crate::Result<Self> {
        let yaml = yaml.into();

        // Stage 1: Parse to get API version
        let value: serde_yaml::Value =
            serde_yaml::from_str(&yaml).map_err(|e| crate::Error::InvalidYaml {
                error: e,
                yaml_content: yaml.clone(),
            })?;

        let with_version: ApiVersionMapping =
            serde_yaml::from_value(value.clone()).map_err(|e| crate::Error::InvalidYaml {
                error: e,
                yaml_content: yaml.clone(),
            })?;

        // Stage 2: Deserialize based on version
        match with_version.api {
            ApiVersion::V0 => {
                serde_yaml::from_value(value).map_err(|e| crate::Error::InvalidYaml {
                    error: e,
                    yaml_content: yaml,
                })
            }
        }
    }

    /// Load a definition from a file path.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| crate::Error::ReadFailed {
            path: path.to_path_buf(),
            error: e,
        })?;

        let mut definition = Self::from_yaml(yaml)?;
        definition.source_path = Some(path.to_path_buf());
        Ok(definition)
    }

    /// Build the package this definition describes.
    pub fn into_package<P: Into<PathBuf>>(
        self,
        name: Option<String>,
        version: Option<String>,
        directory: P,
    ) -> crate::Result<Package> {
        let configs = self
            .configs
            .into_iter()
            .map(|c| Config::new(c.name, c.statements))
            .collect::<crate::Result<Vec<_>>>()?;

        let mut statements = Vec::new();
        statements.extend(
            self.archives
                .into_iter()
                .map(|url| Statement::Archive(ArchiveStatement { url })),
        );
        statements.extend(
            self.resources
                .into_iter()
                .map(|url| Statement::Resource(ResourceStatement { url })),
        );
        statements.extend(self.retrieves.into_iter().map(|(variable, path)| {
            Statement::Retrieve(RetrieveStatement { variable, path })
        }));

        let mut package = Package::new(name, version, directory, configs)?;
        if let Some(primary) = self.primary_config {
            package = package.with_primary_config(primary);
        }
        package.with_statements(statements)
    }
}
