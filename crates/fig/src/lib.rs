// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! fig - configuration-application engine
//!
//! This crate assembles the environment of a run from versioned packages.
//! Each package declares named configs: ordered statements that set or
//! prepend variables, include configs of other packages, and name a command
//! to run.
//!
//! # Overview
//!
//! An [`Environment`] applies a config and every config it includes, each at
//! most once. A package name resolves to exactly one version per run; an
//! include asking for another version is an error unless an override further
//! up the inclusion chain forces the version first. Values may reference the
//! declaring package's directory with `@`, and values of retrieved variables
//! are copied into the working directory and tracked by version.
//!
//! # Example
//!
//! ```yaml
//! # $FIG_HOME/repos/app/1.0/package.fig.yaml
//! api: fig/v0
//! retrieves:
//!   LIBPATH: lib/[package]
//! configs:
//!   - name: default
//!     statements:
//!       - append: PATH
//!         value: "@/bin"
//!       - include: libfoo/2.1
//!         overrides: [ "libbar/1.4" ]
//!       - command: "app --verbose"
//! ```

pub mod ambient;
pub mod backtrace;
pub mod config;
pub mod definition;
pub mod descriptor;
pub mod environment;
pub mod error;
pub mod expand;
pub mod package;
pub mod repository;
pub mod retriever;
pub mod statement;

pub use ambient::AmbientEnvironment;
pub use backtrace::Backtrace;
pub use config::Settings;
pub use definition::{ApiVersion, ConfigDefinition, PackageDefinition};
pub use descriptor::PackageDescriptor;
pub use environment::{Environment, Variables, PATH_SEPARATOR};
pub use error::{Error, Result};
pub use expand::{escape, expand_command_line_argument, expand_path};
pub use package::{Config, Package, DEFAULT_CONFIG};
pub use repository::{LocalRepository, MemoryRepository, Repository};
pub use retriever::{RetrieveRecord, Retriever};
pub use statement::{
    CommandStatement, IncludeStatement, Override, PathStatement, SetStatement, Statement,
};

/// Well-known filename for package definitions.
pub const PACKAGE_FILENAME: &str = "package.fig.yaml";
