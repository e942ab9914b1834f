// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::rc::Rc;

use rstest::rstest;

use super::*;

const NO_OVERRIDES: &[Override] = &[];

fn descriptor(raw: &str) -> PackageDescriptor {
    raw.parse().unwrap()
}

#[rstest]
fn test_override_visible_from_descendants() {
    let root = Rc::new(Backtrace::new(
        None,
        descriptor("app/1.0"),
        &[Override::new("libX", "1.0")],
    ));
    let middle = Rc::new(Backtrace::new(Some(root), descriptor("mid/2.0"), NO_OVERRIDES));
    let leaf = Backtrace::new(Some(middle), descriptor("leaf:default/3.0"), NO_OVERRIDES);

    assert_eq!(leaf.get_override("libX"), Some("1.0"));
    assert_eq!(leaf.get_override("libY"), None);
}

#[rstest]
fn test_nearest_override_wins() {
    let root = Rc::new(Backtrace::new(
        None,
        descriptor("app/1.0"),
        &[Override::new("libX", "1.0")],
    ));
    let middle = Backtrace::new(
        Some(root.clone()),
        descriptor("mid/2.0"),
        &[Override::new("libX", "2.0")],
    );

    assert_eq!(middle.get_override("libX"), Some("2.0"));
    assert_eq!(root.get_override("libX"), Some("1.0"));
}

#[rstest]
fn test_dump_root_to_leaf() {
    let root = Rc::new(Backtrace::root(PackageDescriptor {
        config: Some("default".to_string()),
        ..Default::default()
    }));
    let child = Rc::new(Backtrace::new(
        Some(root),
        descriptor("app:build/1.0"),
        NO_OVERRIDES,
    ));
    let leaf = Backtrace::new(Some(child), descriptor("libX/2.0"), NO_OVERRIDES);

    assert_eq!(leaf.depth(), 3);
    assert_eq!(
        leaf.dump(),
        "<unnamed>:default\n  app/1.0:build\n    libX/2.0\n"
    );
}
