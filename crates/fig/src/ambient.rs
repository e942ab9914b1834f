// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Temporarily materializes a variable mapping into the process environment.

use std::collections::BTreeMap;
use std::ffi::OsString;

#[cfg(test)]
#[path = "./ambient_test.rs"]
mod ambient_test;

/// Guard that restores the process environment when dropped.
///
/// Every variable touched by [`AmbientEnvironment::apply`] is put back to
/// its previous value, or removed if it was previously unset, on every exit
/// path including unwinding.
#[derive(Debug)]
#[must_use = "the environment is restored as soon as the guard is dropped"]
pub struct AmbientEnvironment {
    saved: Vec<(String, Option<OsString>)>,
}

impl AmbientEnvironment {
    /// Export `variables` into the process environment.
    pub fn apply(variables: &BTreeMap<String, String>) -> Self {
        let mut saved = Vec::with_capacity(variables.len());
        for (name, value) in variables {
            if !is_exportable(name, value) {
                tracing::warn!("Not exporting {name:?}: not a valid environment variable");
                continue;
            }
            saved.push((name.clone(), std::env::var_os(name)));
            // SAFETY: fig drives a single logical thread; nothing else reads
            // or writes the environment while a command is being launched.
            unsafe { std::env::set_var(name, value) };
        }
        Self { saved }
    }
}

impl Drop for AmbientEnvironment {
    fn drop(&mut self) {
        for (name, previous) in self.saved.drain(..).rev() {
            // SAFETY: see `AmbientEnvironment::apply`.
            unsafe {
                match previous {
                    Some(value) => std::env::set_var(&name, value),
                    None => std::env::remove_var(&name),
                }
            }
        }
    }
}

fn is_exportable(name: &str, value: &str) -> bool {
    !name.is_empty() && !name.contains(['=', '\0']) && !value.contains('\0')
}
