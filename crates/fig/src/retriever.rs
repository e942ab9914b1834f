// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Copies package files into the working directory and tracks them.
//!
//! Every copied file is recorded against the package name and version it
//! came from. When a different version of a package is retrieved, all files
//! recorded for the old version are deleted first, so the working directory
//! never mixes two versions of one package. Records are persisted to
//! `.fig/retrieve` as `relative/path=name/version` lines.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./retriever_test.rs"]
mod retriever_test;

/// Metadata directory inside the working directory.
pub const METADATA_SUBDIRECTORY: &str = ".fig";

/// Manifest file inside the metadata directory.
pub const RETRIEVE_MANIFEST: &str = "retrieve";

/// Files retrieved for one package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieveRecord {
    pub name: String,
    pub version: String,
    pub files: BTreeSet<String>,
}

impl RetrieveRecord {
    fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            files: BTreeSet::new(),
        }
    }
}

/// Tracks files copied into a working directory across runs.
#[derive(Debug)]
pub struct Retriever {
    base_dir: PathBuf,
    records: BTreeMap<String, RetrieveRecord>,
    active: Option<String>,
}

impl Retriever {
    /// Open the working directory at `base_dir`, loading any existing
    /// manifest.
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> Result<Self> {
        let mut retriever = Self {
            base_dir: base_dir.into(),
            records: BTreeMap::new(),
            active: None,
        };

        let manifest = retriever.manifest_path();
        if manifest.is_file() {
            retriever.load(&manifest)?;
        }
        Ok(retriever)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.base_dir
            .join(METADATA_SUBDIRECTORY)
            .join(RETRIEVE_MANIFEST)
    }

    pub fn record(&self, name: &str) -> Option<&RetrieveRecord> {
        self.records.get(name)
    }

    pub fn records(&self) -> impl Iterator<Item = &RetrieveRecord> {
        self.records.values()
    }

    /// Run `body` with files attributed to `name`/`version`.
    ///
    /// If a different version of `name` was retrieved before, its files are
    /// deleted from the working directory first. Files copied for a package
    /// without a name or version are not tracked.
    pub fn with_package_config<T, F>(
        &mut self,
        name: Option<&str>,
        version: Option<&str>,
        body: F,
    ) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let previous = self.active.take();
        if let (Some(name), Some(version)) = (name, version) {
            self.begin_record(name, version)?;
            self.active = Some(name.to_string());
        }
        let result = body(self);
        self.active = previous;
        result
    }

    fn begin_record(&mut self, name: &str, version: &str) -> Result<()> {
        let superseded = self
            .records
            .get(name)
            .is_some_and(|record| record.version != version);
        if superseded {
            if let Some(stale) = self.records.remove(name) {
                for relpath in &stale.files {
                    tracing::info!("- [{}/{}] {relpath}", stale.name, stale.version);
                    remove_if_present(&self.base_dir.join(relpath))?;
                }
            }
        }
        self.records
            .entry(name.to_string())
            .or_insert_with(|| RetrieveRecord::new(name, version));
        Ok(())
    }

    /// Copy `source` to `relpath` under the working directory.
    ///
    /// Directories are copied entry by entry. Files are only copied when the
    /// target is missing or older than the source, but are recorded either
    /// way.
    pub fn retrieve(&mut self, source: &Path, relpath: &str) -> Result<()> {
        let relpath = relative_path(relpath)?;
        let relpath = relpath.as_str();
        let target = self.base_dir.join(relpath);
        if source.is_dir() {
            std::fs::create_dir_all(&target)?;
            let mut children = std::fs::read_dir(source)
                .map_err(|e| Error::ReadFailed {
                    path: source.to_path_buf(),
                    error: e,
                })?
                .collect::<std::io::Result<Vec<_>>>()?;
            children.sort_by_key(|entry| entry.file_name());
            for child in children {
                let child_relpath = join_relative(relpath, &child.file_name().to_string_lossy());
                tracing::debug!(
                    "Copying {} to {child_relpath}",
                    child.path().display()
                );
                self.retrieve(&child.path(), &child_relpath)?;
            }
            return Ok(());
        }

        if needs_copy(source, &target)? {
            match self.active_record() {
                Some(record) => {
                    tracing::info!("+ [{}/{}] {relpath}", record.name, record.version)
                }
                None => tracing::info!("+ {relpath}"),
            }
            copy_preserving_mtime(source, &target)?;
        } else {
            tracing::debug!("Skipping up-to-date {relpath}");
        }

        if let Some(record) = self.active_record_mut() {
            record.files.insert(relpath.to_string());
        }
        Ok(())
    }

    /// Write every record to the manifest, replacing the previous one.
    pub fn save(&self) -> Result<()> {
        let manifest = self.manifest_path();
        if let Some(parent) = manifest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut contents = String::new();
        for record in self.records.values() {
            for relpath in &record.files {
                contents.push_str(&format!("{relpath}={}/{}\n", record.name, record.version));
            }
        }
        std::fs::write(&manifest, contents)?;
        Ok(())
    }

    fn load(&mut self, manifest: &Path) -> Result<()> {
        let contents = std::fs::read_to_string(manifest).map_err(|e| Error::ReadFailed {
            path: manifest.to_path_buf(),
            error: e,
        })?;

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (relpath, name, version) =
                parse_manifest_line(line).ok_or_else(|| Error::ManifestParse {
                    path: manifest.to_path_buf(),
                    line: line.to_string(),
                })?;
            let relpath = relative_path(relpath)?;

            let record = self
                .records
                .entry(name.to_string())
                .or_insert_with(|| RetrieveRecord::new(name, version));
            if record.version != version {
                return Err(Error::ManifestConsistency {
                    path: manifest.to_path_buf(),
                    package: name.to_string(),
                });
            }
            record.files.insert(relpath);
        }
        Ok(())
    }

    fn active_record(&self) -> Option<&RetrieveRecord> {
        self.active.as_ref().and_then(|name| self.records.get(name))
    }

    fn active_record_mut(&mut self) -> Option<&mut RetrieveRecord> {
        self.active.as_ref().and_then(|name| self.records.get_mut(name))
    }
}

/// Split `path=name/version`; every part must be non-empty.
fn parse_manifest_line(line: &str) -> Option<(&str, &str, &str)> {
    let (relpath, package) = line.rsplit_once('=')?;
    let (name, version) = package.rsplit_once('/')?;
    if relpath.is_empty() || name.is_empty() || version.is_empty() {
        return None;
    }
    Some((relpath, name, version))
}

/// Normalize `path` to a `/`-separated path below the working directory.
///
/// Leading roots and prefixes are dropped, so `/lib/foo` lands at
/// `lib/foo`. Any `..` component is rejected.
pub(crate) fn relative_path(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => return Err(Error::OutsideWorkingDir(path.to_string())),
        }
    }
    Ok(parts.join("/"))
}

/// Join two relative paths with a single `/`.
pub(crate) fn join_relative(parent: &str, child: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let child = child.trim_start_matches('/');
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}/{child}")
    }
}

fn needs_copy(source: &Path, target: &Path) -> Result<bool> {
    let source_meta = std::fs::metadata(source).map_err(|e| Error::ReadFailed {
        path: source.to_path_buf(),
        error: e,
    })?;
    let Ok(target_meta) = std::fs::metadata(target) else {
        return Ok(true);
    };
    Ok(source_meta.modified()? > target_meta.modified()?)
}

fn copy_preserving_mtime(source: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::copy(source, target)?;
    let modified = std::fs::metadata(source)?.modified()?;
    std::fs::File::options()
        .write(true)
        .open(target)?
        .set_modified(modified)?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}
