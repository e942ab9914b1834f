// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! fig - package environment manager CLI

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use miette::Result;

mod cmd_get;
mod cmd_list_configs;
mod cmd_list_dependencies;
mod cmd_list_local;
mod cmd_list_variables;
mod cmd_run;
mod session;

use cmd_get::CmdGet;
use cmd_list_configs::CmdListConfigs;
use cmd_list_dependencies::CmdListDependencies;
use cmd_list_local::CmdListLocal;
use cmd_list_variables::CmdListVariables;
use cmd_run::CmdRun;


#[derive(Parser)]
#[clap(
    name = "fig",
    about = "Package environment manager",
    version,
    long_about = "Assemble an environment from versioned packages and run commands in it"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(flatten)]
    locations: LocationFlags,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long, global = true)]
    quiet: bool,
}

/// Where packages come from and where retrieved files go.
#[derive(Args, Clone, Debug, Default)]
pub struct LocationFlags {
    /// Root of the local package repository [default: ~/.fighome]
    #[clap(long, global = true, env = "FIG_HOME")]
    pub home: Option<PathBuf>,

    /// Directory that retrieved files are copied into [default: .]
    #[clap(long, global = true)]
    pub working_dir: Option<PathBuf>,

    /// Package definition to read from the working directory
    #[clap(long, global = true, conflicts_with = "no_file")]
    pub file: Option<PathBuf>,

    /// Ignore the package definition in the working directory
    #[clap(long, global = true)]
    pub no_file: bool,
}

impl LocationFlags {
    pub fn settings(&self) -> Result<fig::Settings> {
        Ok(fig::Settings::resolve(
            self.home.clone(),
            self.working_dir.clone(),
            self.file.clone(),
            !self.no_file,
        )?)
    }
}

/// Selects the package and statements that make up the environment.
#[derive(Args, Clone, Debug, Default)]
pub struct EnvironmentFlags {
    /// Package to apply, as NAME[:CONFIG][/VERSION]
    pub descriptor: Option<String>,

    /// Also include another package
    #[clap(short, long = "include", value_name = "DESCRIPTOR")]
    pub include: Vec<String>,

    /// Set a variable after the package is applied
    #[clap(short, long = "set", value_name = "VAR=VALUE")]
    pub set: Vec<String>,

    /// Prepend onto a path-like variable after the package is applied
    #[clap(short, long = "append", value_name = "VAR=VALUE")]
    pub append: Vec<String>,

    /// Config to apply instead of the primary one
    #[clap(short, long)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply an environment and run a command in it
    Run(CmdRun),

    /// Print one variable of the resulting environment
    Get(CmdGet),

    /// List the configs of a package
    ListConfigs(CmdListConfigs),

    /// List packages in the local repository
    ListLocal(CmdListLocal),

    /// List the packages an environment resolves
    ListDependencies(CmdListDependencies),

    /// List the variables an environment's packages define
    ListVariables(CmdListVariables),
}

impl Opt {
    fn run(self) -> Result<i32> {
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .init();

        let settings = self.locations.settings()?;
        match self.cmd {
            Command::Run(mut cmd) => cmd.run(&settings),
            Command::Get(mut cmd) => cmd.run(&settings),
            Command::ListConfigs(mut cmd) => cmd.run(&settings),
            Command::ListLocal(mut cmd) => cmd.run(&settings),
            Command::ListDependencies(mut cmd) => cmd.run(&settings),
            Command::ListVariables(mut cmd) => cmd.run(&settings),
        }
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run()?;
    std::process::exit(code);
}
