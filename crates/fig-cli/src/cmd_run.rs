// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `fig run` command.

use clap::Args;
use miette::Result;

use crate::session;
use crate::EnvironmentFlags;

/// Apply an environment and run a command in it
#[derive(Debug, Args)]
pub struct CmdRun {
    #[clap(flatten)]
    pub env: EnvironmentFlags,

    /// Command to run instead of the config's command
    #[clap(last = true)]
    pub command: Vec<String>,
}

impl CmdRun {
    pub fn run(&mut self, settings: &fig::Settings) -> Result<i32> {
        let mut session = session::load(settings, &self.env)?;

        if !self.command.is_empty() {
            return Ok(session
                .environment
                .execute_shell(&self.command, run_command)?);
        }

        let descriptor = session.command_descriptor(&self.env)?;
        let base = std::rc::Rc::clone(&session.base);
        Ok(session
            .environment
            .execute_config(&base, &descriptor, &[], run_command)?)
    }
}

/// Run `argv` with the current process environment and return its exit code.
fn run_command(argv: Vec<String>) -> fig::Result<i32> {
    let Some((program, args)) = argv.split_first() else {
        return Err(fig::Error::Internal("no command to run".to_string()));
    };

    tracing::debug!("Running {}", argv.join(" "));
    let status = std::process::Command::new(program).args(args).status()?;
    match status.code() {
        Some(code) => Ok(code),
        None => {
            tracing::warn!("{program} was terminated by a signal");
            Ok(1)
        }
    }
}
