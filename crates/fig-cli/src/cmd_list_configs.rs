// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `fig list-configs` command.

use clap::Args;
use colored::Colorize;
use fig::{PackageDefinition, PackageDescriptor, Repository};
use miette::Result;

/// List the configs of a package
#[derive(Debug, Args)]
pub struct CmdListConfigs {
    /// Package to inspect, as NAME/VERSION [default: the package file]
    pub descriptor: Option<String>,
}

impl CmdListConfigs {
    pub fn run(&mut self, settings: &fig::Settings) -> Result<i32> {
        let package = match &self.descriptor {
            Some(raw) => {
                let descriptor: PackageDescriptor = raw.parse()?;
                let (Some(name), Some(version)) = (&descriptor.name, &descriptor.version) else {
                    return Err(miette::miette!(
                        "Listing configs needs a package name and version, got \"{raw}\""
                    ));
                };
                settings.repository().get_package(name, version)?
            }
            None => {
                let Some(path) = settings.existing_package_file() else {
                    return Err(miette::miette!(
                        "No package file found in {}",
                        settings.working_dir.display()
                    ));
                };
                PackageDefinition::load(path)?.into_package(None, None, &settings.working_dir)?
            }
        };

        let primary = package.effective_config_name();
        for name in package.config_names() {
            if name == primary {
                println!("{} {}", name, "(primary)".dimmed());
            } else {
                println!("{name}");
            }
        }
        Ok(0)
    }
}
