// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `fig list-variables` command.

use std::collections::BTreeSet;

use clap::Args;
use miette::Result;

use crate::session::{self, Session};
use crate::EnvironmentFlags;

/// List the variables an environment's packages define
#[derive(Debug, Args)]
pub struct CmdListVariables {
    #[clap(flatten)]
    pub env: EnvironmentFlags,

    /// Print NAME=VALUE instead of just the name
    #[clap(long)]
    pub values: bool,
}

impl CmdListVariables {
    pub fn run(&mut self, settings: &fig::Settings) -> Result<i32> {
        let session = session::load(settings, &self.env)?;
        for name in variable_names(&session) {
            if self.values {
                let value = session.environment.get(&name).unwrap_or_default();
                println!("{name}={value}");
            } else {
                println!("{name}");
            }
        }
        Ok(0)
    }
}

/// Variables set or appended by the base package and every resolved package.
pub fn variable_names(session: &Session) -> BTreeSet<String> {
    let mut names = session.base.applied_variable_names();
    for package in session.environment.packages() {
        names.extend(package.applied_variable_names());
    }
    names
}
