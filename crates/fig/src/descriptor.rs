// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Package descriptors: `<name>[:<config>][/<version>]`.

use std::fmt;
use std::str::FromStr;

use crate::Error;

#[cfg(test)]
#[path = "./descriptor_test.rs"]
mod descriptor_test;

/// A reference to a package, one of its configs and/or one of its versions.
///
/// Every part is optional; `":debug"` names a config of the enclosing
/// package and `"foo"` names whatever version of `foo` is already resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageDescriptor {
    pub name: Option<String>,
    pub config: Option<String>,
    pub version: Option<String>,
}

impl PackageDescriptor {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.config.is_none() && self.version.is_none()
    }
}

/// Whether `part` is a legal package, config or version name.
pub fn is_valid_name(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

fn optional_part(part: &str, raw: &str) -> crate::Result<Option<String>> {
    if part.is_empty() {
        return Ok(None);
    }
    if !is_valid_name(part) {
        return Err(Error::InvalidDescriptor(raw.to_string()));
    }
    Ok(Some(part.to_string()))
}

impl FromStr for PackageDescriptor {
    type Err = Error;

    fn from_str(raw: &str) -> crate::Result<Self> {
        let (head, version) = match raw.split_once('/') {
            Some((head, version)) => {
                if version.is_empty() {
                    return Err(Error::InvalidDescriptor(raw.to_string()));
                }
                (head, version)
            }
            None => (raw, ""),
        };
        let (name, config) = match head.split_once(':') {
            Some((name, config)) => {
                if config.is_empty() {
                    return Err(Error::InvalidDescriptor(raw.to_string()));
                }
                (name, config)
            }
            None => (head, ""),
        };

        let descriptor = Self {
            name: optional_part(name, raw)?,
            config: optional_part(config, raw)?,
            version: optional_part(version, raw)?,
        };
        if descriptor.is_empty() {
            return Err(Error::InvalidDescriptor(raw.to_string()));
        }
        Ok(descriptor)
    }
}

impl fmt::Display for PackageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            f.write_str(name)?;
        }
        if let Some(config) = &self.config {
            write!(f, ":{config}")?;
        }
        if let Some(version) = &self.version {
            write!(f, "/{version}")?;
        }
        Ok(())
    }
}
