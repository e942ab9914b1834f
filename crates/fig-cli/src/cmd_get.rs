// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `fig get` command.

use clap::Args;
use miette::Result;

use crate::session;
use crate::EnvironmentFlags;

/// Print one variable of the resulting environment
#[derive(Debug, Args)]
pub struct CmdGet {
    /// Variable to print
    pub variable: String,

    #[clap(flatten)]
    pub env: EnvironmentFlags,
}

impl CmdGet {
    pub fn run(&mut self, settings: &fig::Settings) -> Result<i32> {
        let session = session::load(settings, &self.env)?;
        match session.environment.get(&self.variable) {
            Some(value) => {
                println!("{value}");
                Ok(0)
            }
            None => {
                tracing::warn!("{} is not set", self.variable);
                Ok(1)
            }
        }
    }
}
