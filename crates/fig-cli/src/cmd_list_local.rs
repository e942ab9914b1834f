// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `fig list-local` command.

use clap::Args;
use colored::Colorize;
use miette::Result;

/// List packages in the local repository
#[derive(Debug, Args)]
pub struct CmdListLocal {}

impl CmdListLocal {
    pub fn run(&mut self, settings: &fig::Settings) -> Result<i32> {
        let packages = settings.repository().list_packages()?;
        if packages.is_empty() {
            tracing::info!("No packages in {}", settings.home.display());
        }
        for (name, version) in packages {
            println!("{}/{}", name.cyan(), version);
        }
        Ok(0)
    }
}
