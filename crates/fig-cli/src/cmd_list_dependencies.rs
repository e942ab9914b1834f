// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `fig list-dependencies` command.

use std::rc::Rc;

use clap::Args;
use colored::Colorize;
use fig::{Package, PackageDescriptor};
use miette::Result;

use crate::session::{self, Session};
use crate::EnvironmentFlags;

/// List the packages an environment resolves
#[derive(Debug, Args)]
pub struct CmdListDependencies {
    #[clap(flatten)]
    pub env: EnvironmentFlags,

    /// Show the inclusion chain each package was resolved through
    #[clap(long)]
    pub why: bool,
}

impl CmdListDependencies {
    pub fn run(&mut self, settings: &fig::Settings) -> Result<i32> {
        let session = session::load(settings, &self.env)?;
        for package in dependencies(&session, &self.env)? {
            println!("{}", package.to_string().cyan());
            if !self.why {
                continue;
            }
            if let Some(backtrace) = package.backtrace() {
                for (depth, frame) in backtrace.frames().into_iter().enumerate() {
                    println!("  {}{}", "  ".repeat(depth), frame.to_string().dimmed());
                }
            }
        }
        Ok(0)
    }
}

/// Every resolved package except the one named on the command line.
pub fn dependencies(session: &Session, flags: &EnvironmentFlags) -> Result<Vec<Rc<Package>>> {
    let named = match &flags.descriptor {
        Some(raw) => raw.parse::<PackageDescriptor>()?.name,
        None => None,
    };
    Ok(session
        .environment
        .packages()
        .filter(|package| package.name() != named.as_deref())
        .cloned()
        .collect())
}
