// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Expansion of `@` package references and backslash escapes.
//!
//! Values may reference package directories with `@`: a bare `@` stands for
//! the directory of the package that declares the value, and on command lines
//! `@name` stands for the directory of the resolved package `name`. The only
//! escapes are `\\` and `\@`; any other backslash sequence is an error.
//!
//! References are substituted first. A backslash always pairs with the
//! character after it, so the parity of a backslash run decides whether a
//! following `@` is a reference or a literal. Escapes are then validated and
//! collapsed over the substituted string, directories included; substituted
//! text is never searched for further references.

use crate::{Error, Result};

#[cfg(test)]
#[path = "./expand_test.rs"]
mod expand_test;

const ESCAPE: char = '\\';
const REFERENCE: char = '@';

/// Replace every unescaped `@` with `directory` and collapse escapes.
pub fn expand_path(value: &str, directory: &str) -> Result<String> {
    scan(value, |_| Ok((directory.to_string(), 0)))
}

/// Expand a command-line argument.
///
/// `@name` resolves through `lookup`, failing with
/// [`Error::PackageNotFound`] when it returns nothing. A bare `@` expands to
/// `own_directory` when one is given and stays a literal `@` otherwise.
pub fn expand_command_line_argument<F>(
    arg: &str,
    own_directory: Option<&str>,
    mut lookup: F,
) -> Result<String>
where
    F: FnMut(&str) -> Option<String>,
{
    scan(arg, |rest| {
        let len = package_name_len(rest);
        if len == 0 {
            let replacement = own_directory.unwrap_or("@");
            return Ok((replacement.to_string(), 0));
        }
        let name = &rest[..len];
        match lookup(name) {
            Some(directory) => Ok((directory, len)),
            None => Err(Error::PackageNotFound(name.to_string())),
        }
    })
}

/// Escape `s` so that expansion yields it back unchanged.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == ESCAPE || c == REFERENCE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out
}

/// Length in bytes of the `[A-Za-z0-9.-]+` package name at the start of `s`.
fn package_name_len(s: &str) -> usize {
    s.bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-'))
        .count()
}

/// Substitute unescaped `@` references in `original`, then validate and
/// collapse escapes over the result. Errors name the unsubstituted string.
fn scan<F>(original: &str, substitute: F) -> Result<String>
where
    F: FnMut(&str) -> Result<(String, usize)>,
{
    let substituted = substitute_references(original, substitute)?;
    collapse_escapes(&substituted, original)
}

/// Hand the text after each unescaped `@` to `substitute`, which returns the
/// replacement and how many bytes after the `@` it consumed. Escapes are
/// copied through untouched; substituted text is never rescanned.
fn substitute_references<F>(original: &str, mut substitute: F) -> Result<String>
where
    F: FnMut(&str) -> Result<(String, usize)>,
{
    let mut out = String::with_capacity(original.len());
    let mut pos = 0;

    while let Some(c) = original[pos..].chars().next() {
        pos += c.len_utf8();
        match c {
            ESCAPE => {
                out.push(ESCAPE);
                if let Some(next) = original[pos..].chars().next() {
                    out.push(next);
                    pos += next.len_utf8();
                }
            }
            REFERENCE => {
                let (replacement, consumed) = substitute(&original[pos..])?;
                out.push_str(&replacement);
                pos += consumed;
            }
            c => out.push(c),
        }
    }

    Ok(out)
}

fn collapse_escapes(substituted: &str, original: &str) -> Result<String> {
    let mut out = String::with_capacity(substituted.len());
    let mut chars = substituted.chars();

    while let Some(c) = chars.next() {
        if c != ESCAPE {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ (ESCAPE | REFERENCE)) => out.push(next),
            Some(next) => {
                return Err(Error::BadEscape {
                    escape: format!("{ESCAPE}{next}"),
                    original: original.to_string(),
                });
            }
            // A trailing backslash has nothing to escape and is kept.
            None => out.push(ESCAPE),
        }
    }

    Ok(out)
}
