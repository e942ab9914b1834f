// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Typed statements that make up package configs.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::descriptor::{is_valid_name, PackageDescriptor};
use crate::Error;

#[cfg(test)]
#[path = "./statement_test.rs"]
mod statement_test;

/// A single declarative effect inside a package definition.
///
/// `Set`, `Path`, `Include` and `Command` live inside configs. `Archive`,
/// `Resource` and `Retrieve` describe the package itself and are rejected
/// when they appear in a config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Statement {
    Set(SetStatement),
    Path(PathStatement),
    Include(IncludeStatement),
    Command(CommandStatement),
    Archive(ArchiveStatement),
    Resource(ResourceStatement),
    Retrieve(RetrieveStatement),
}

impl Statement {
    /// Whether this statement may appear inside a config.
    pub fn is_config_statement(&self) -> bool {
        matches!(
            self,
            Self::Set(_) | Self::Path(_) | Self::Include(_) | Self::Command(_)
        )
    }
}

/// Replace a variable unconditionally.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetStatement {
    #[serde(rename = "set")]
    pub name: String,
    pub value: String,
}

/// Prepend onto a path-like variable.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathStatement {
    #[serde(rename = "append", alias = "path")]
    pub name: String,
    pub value: String,
}

/// Pull in a config of another package, or another config of this one.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawInclude")]
pub struct IncludeStatement {
    pub package_name: Option<String>,
    pub config_name: Option<String>,
    pub version_name: Option<String>,
    pub overrides: Vec<Override>,
}

impl IncludeStatement {
    pub fn new(descriptor: PackageDescriptor, overrides: Vec<Override>) -> Self {
        Self {
            package_name: descriptor.name,
            config_name: descriptor.config,
            version_name: descriptor.version,
            overrides,
        }
    }

    pub fn descriptor(&self) -> PackageDescriptor {
        PackageDescriptor {
            name: self.package_name.clone(),
            config: self.config_name.clone(),
            version: self.version_name.clone(),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInclude {
    include: String,
    #[serde(default)]
    overrides: Vec<Override>,
}

impl TryFrom<RawInclude> for IncludeStatement {
    type Error = Error;

    fn try_from(raw: RawInclude) -> crate::Result<Self> {
        let descriptor: PackageDescriptor = raw.include.parse()?;
        Ok(Self::new(descriptor, raw.overrides))
    }
}

/// Forces the version of a package for everything below an include.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct Override {
    pub package_name: String,
    pub version_name: String,
}

impl Override {
    pub fn new<N: Into<String>, V: Into<String>>(package_name: N, version_name: V) -> Self {
        Self {
            package_name: package_name.into(),
            version_name: version_name.into(),
        }
    }
}

impl FromStr for Override {
    type Err = Error;

    fn from_str(raw: &str) -> crate::Result<Self> {
        match raw.split_once('/') {
            Some((name, version)) if is_valid_name(name) && is_valid_name(version) => {
                Ok(Self::new(name, version))
            }
            _ => Err(Error::InvalidDescriptor(raw.to_string())),
        }
    }
}

impl TryFrom<String> for Override {
    type Error = Error;

    fn try_from(raw: String) -> crate::Result<Self> {
        raw.parse()
    }
}

/// The command a config runs; read only when a command is executed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandStatement {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// An archive that is part of the package; its contents get extracted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArchiveStatement {
    #[serde(rename = "archive")]
    pub url: String,
}

/// A single file that is part of the package.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceStatement {
    #[serde(rename = "resource")]
    pub url: String,
}

/// Registers a variable whose values get copied into the working directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrieveStatement {
    #[serde(rename = "retrieve")]
    pub variable: String,
    pub path: String,
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(stmt) => write!(f, "set {}={}", stmt.name, stmt.value),
            Self::Path(stmt) => write!(f, "append {}={}", stmt.name, stmt.value),
            Self::Include(stmt) => {
                write!(f, "include {}", stmt.descriptor())?;
                for o in &stmt.overrides {
                    write!(f, " override {}/{}", o.package_name, o.version_name)?;
                }
                Ok(())
            }
            Self::Command(stmt) => {
                write!(f, "command \"{}", stmt.command)?;
                for arg in &stmt.args {
                    write!(f, " {arg}")?;
                }
                f.write_str("\"")
            }
            Self::Archive(stmt) => write!(f, "archive \"{}\"", stmt.url),
            Self::Resource(stmt) => write!(f, "resource {}", stmt.url),
            Self::Retrieve(stmt) => write!(f, "retrieve {}->{}", stmt.variable, stmt.path),
        }
    }
}
