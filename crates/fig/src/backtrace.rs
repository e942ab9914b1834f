// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Inclusion scope chain used for override lookup and conflict reports.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::descriptor::PackageDescriptor;
use crate::statement::Override;

#[cfg(test)]
#[path = "./backtrace_test.rs"]
mod backtrace_test;

/// One inclusion site: which package/version/config was being entered and
/// which versions were forced from that point down.
///
/// Frames are built top-down while configs are applied and never change
/// after construction. A package keeps the frame it was first resolved
/// under so that version conflicts can show both inclusion chains.
#[derive(Debug, Default)]
pub struct Backtrace {
    parent: Option<Rc<Backtrace>>,
    package_name: Option<String>,
    version_name: Option<String>,
    config_name: Option<String>,
    overrides: HashMap<String, String>,
}

impl Backtrace {
    pub fn new<'a, I>(
        parent: Option<Rc<Backtrace>>,
        descriptor: PackageDescriptor,
        overrides: I,
    ) -> Self
    where
        I: IntoIterator<Item = &'a Override>,
    {
        let overrides = overrides
            .into_iter()
            .map(|o| (o.package_name.clone(), o.version_name.clone()))
            .collect();
        Self {
            parent,
            package_name: descriptor.name,
            version_name: descriptor.version,
            config_name: descriptor.config,
            overrides,
        }
    }

    /// A frame with no parent, for the start of a run.
    pub fn root(descriptor: PackageDescriptor) -> Self {
        Self::new(None, descriptor, std::iter::empty())
    }

    /// The forced version for `package_name`, if this frame or any ancestor
    /// declared one. The nearest declaration wins.
    pub fn get_override(&self, package_name: &str) -> Option<&str> {
        let mut frame = Some(self);
        while let Some(current) = frame {
            if let Some(version) = current.overrides.get(package_name) {
                return Some(version.as_str());
            }
            frame = current.parent.as_deref();
        }
        None
    }

    /// Number of frames from the root to this one, inclusive.
    pub fn depth(&self) -> usize {
        let mut depth = 1;
        let mut frame = self.parent.as_deref();
        while let Some(current) = frame {
            depth += 1;
            frame = current.parent.as_deref();
        }
        depth
    }

    /// Frames ordered from the root down to this one.
    pub fn frames(&self) -> Vec<&Backtrace> {
        let mut frames = Vec::with_capacity(self.depth());
        let mut frame = Some(self);
        while let Some(current) = frame {
            frames.push(current);
            frame = current.parent.as_deref();
        }
        frames.reverse();
        frames
    }

    /// Render the chain root-to-leaf, one indented frame per line.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (depth, frame) in self.frames().into_iter().enumerate() {
            out.push_str(&"  ".repeat(depth));
            out.push_str(&frame.to_string());
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for Backtrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.package_name.as_deref().unwrap_or("<unnamed>"))?;
        if let Some(version) = &self.version_name {
            write!(f, "/{version}")?;
        }
        if let Some(config) = &self.config_name {
            write!(f, ":{config}")?;
        }
        Ok(())
    }
}
