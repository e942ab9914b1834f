// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for fig operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience Result type with fig Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while assembling or running an environment.
///
/// Every variant is fatal to the current run.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Two packages registered under the same name
    #[error("There is already a package with the name \"{0}\"")]
    #[diagnostic(code(fig::duplicate_name))]
    DuplicateName(String),

    /// An include asked for a different version of an already resolved package
    #[error("Version mismatch: {package}{backtraces}")]
    #[diagnostic(
        code(fig::version_conflict),
        help("Add an override for {} to an include higher up the chain", package)
    )]
    VersionConflict { package: String, backtraces: String },

    /// An include referenced an unresolved package without a version
    #[error("No version specified for {0}")]
    #[diagnostic(code(fig::missing_version))]
    MissingVersion(String),

    /// A named `@package` reference could not be resolved
    #[error("Package not found: {0}")]
    #[diagnostic(
        code(fig::package_not_found),
        help("Only packages that are part of the current environment can be referenced")
    )]
    PackageNotFound(String),

    /// A string contained an invalid backslash escape
    #[error("Unknown escape \"{escape}\" in \"{original}\"")]
    #[diagnostic(
        code(fig::bad_escape),
        help("Only \\\\ and \\@ are valid escapes")
    )]
    BadEscape { escape: String, original: String },

    /// The selected config has no command to run
    #[error("The \"{package}\" package with the \"{config}\" configuration does not contain a command")]
    #[diagnostic(code(fig::no_command))]
    NoCommand { package: String, config: String },

    /// The repository has no such package version
    #[error("Package not found in repository: {name}/{version}")]
    #[diagnostic(code(fig::not_found))]
    NotFound { name: String, version: String },

    /// A package has no config with the requested name
    #[error("There is no config named \"{config}\" in package \"{package}\"")]
    #[diagnostic(code(fig::unknown_config))]
    UnknownConfig { package: String, config: String },

    /// Malformed package descriptor or override text
    #[error("Invalid package descriptor \"{0}\"")]
    #[diagnostic(
        code(fig::invalid_descriptor),
        help("Descriptors look like <name>[:<config>][/<version>]")
    )]
    InvalidDescriptor(String),

    /// Statement that is not allowed where it was declared
    #[error("Invalid statement: {0}")]
    #[diagnostic(code(fig::invalid_statement))]
    InvalidStatement(String),

    /// A retrieve target would leave the working directory
    #[error("Retrieve target \"{0}\" is outside the working directory")]
    #[diagnostic(
        code(fig::outside_working_dir),
        help("Retrieve destinations must not contain '..'")
    )]
    OutsideWorkingDir(String),

    /// Retrieval manifest line that is not `path=name/version`
    #[error("Parse error in {path:?}: {line}")]
    #[diagnostic(
        code(fig::manifest_parse),
        help("Remove the retrieve manifest to start tracking from scratch")
    )]
    ManifestParse { path: PathBuf, line: String },

    /// Retrieval manifest records two versions for one package
    #[error("Version mismatch for {package} in {path:?}")]
    #[diagnostic(
        code(fig::manifest_consistency),
        help("Remove the retrieve manifest to start tracking from scratch")
    )]
    ManifestConsistency { path: PathBuf, package: String },

    /// Invalid YAML in a package definition
    #[error("Invalid package definition: {error}")]
    #[diagnostic(
        code(fig::invalid_yaml),
        help("Check YAML syntax and ensure 'api: fig/v0' is present")
    )]
    InvalidYaml {
        #[source]
        error: serde_yaml::Error,
        yaml_content: String,
    },

    /// Failed to read file
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(fig::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Broken internal contract
    #[error("Internal error: {0}")]
    #[diagnostic(code(fig::internal))]
    Internal(String),

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(fig::io_error))]
    Io(#[from] std::io::Error),
}
