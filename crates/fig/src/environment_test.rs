// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use rstest::{fixture, rstest};
use serial_test::serial;
use tempfile::TempDir;

use super::*;
use crate::package::Config;
use crate::repository::MemoryRepository;
use crate::statement::{Override, SetStatement};

struct Workspace {
    tmp: TempDir,
    work: PathBuf,
}

impl Workspace {
    fn package_dir(&self, name: &str, version: &str) -> PathBuf {
        self.tmp.path().join("packages").join(format!("{name}-{version}"))
    }

    fn write_package_file(&self, name: &str, version: &str, relpath: &str, content: &str) {
        let path = self.package_dir(name, version).join(relpath);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

#[fixture]
fn workspace() -> Workspace {
    let tmp = TempDir::new().unwrap();
    let work = tmp.path().join("work");
    std::fs::create_dir_all(&work).unwrap();
    Workspace { tmp, work }
}

fn environment(
    repo: MemoryRepository,
    work: &Path,
    variables: &[(&str, &str)],
) -> (Environment, Rc<MemoryRepository>) {
    let repo = Rc::new(repo);
    let variables = variables
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let env = Environment::new(
        Box::new(Rc::clone(&repo)),
        Some(variables),
        Retriever::new(work).unwrap(),
    );
    (env, repo)
}

fn include(descriptor: &str) -> Statement {
    Statement::Include(IncludeStatement::new(descriptor.parse().unwrap(), vec![]))
}

fn include_with_overrides(descriptor: &str, overrides: &[&str]) -> Statement {
    let overrides = overrides
        .iter()
        .map(|o| o.parse::<Override>().unwrap())
        .collect();
    Statement::Include(IncludeStatement::new(descriptor.parse().unwrap(), overrides))
}

fn set(name: &str, value: &str) -> Statement {
    Statement::Set(SetStatement {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// The unnamed package assembled from the command line.
fn base_package(configs: Vec<(&str, Vec<Statement>)>) -> Rc<Package> {
    let configs = configs
        .into_iter()
        .map(|(name, statements)| Config::new(name, statements).unwrap())
        .collect();
    Rc::new(Package::new(None, None, "/work", configs).unwrap())
}

fn apply_base(env: &mut Environment, statements: Vec<Statement>) -> Result<Rc<Package>> {
    let base = base_package(vec![(DEFAULT_CONFIG, statements)]);
    env.apply_config(&base, DEFAULT_CONFIG, None)?;
    Ok(base)
}

#[rstest]
fn test_set_and_append_expand_package_directory(workspace: Workspace) {
    let mut repo = MemoryRepository::new();
    repo.insert_yaml(
        "A",
        "1",
        "/pkgs/A-1",
        r#"
configs:
  - name: default
    statements:
      - set: FOO
        value: "@/etc"
      - append: PATH
        value: "@/bin"
      - append: NEWPATH
        value: "\\@literal"
"#,
    )
    .unwrap();
    let (mut env, _) = environment(repo, &workspace.work, &[("PATH", "/usr/bin")]);

    apply_base(&mut env, vec![include("A/1")]).unwrap();

    assert_eq!(env.get("FOO"), Some("/pkgs/A-1/etc"));
    assert_eq!(
        env.get("PATH"),
        Some(format!("/pkgs/A-1/bin{PATH_SEPARATOR}/usr/bin").as_str())
    );
    assert_eq!(env.get("NEWPATH"), Some("@literal"));
}

#[rstest]
fn test_append_matches_existing_name_ignoring_case(workspace: Workspace) {
    let mut repo = MemoryRepository::new();
    repo.insert_yaml(
        "A",
        "1",
        "/pkgs/A-1",
        "configs:\n  - name: default\n    statements:\n      - path: path\n        value: /a\n",
    )
    .unwrap();
    let (mut env, _) = environment(repo, &workspace.work, &[("Path", "/sys")]);

    apply_base(&mut env, vec![include("A/1")]).unwrap();

    assert_eq!(
        env.get("Path"),
        Some(format!("/a{PATH_SEPARATOR}/sys").as_str())
    );
    assert_eq!(env.get("path"), None);
}

#[rstest]
fn test_unnamed_package_values_are_literal(workspace: Workspace) {
    let (mut env, _) = environment(MemoryRepository::new(), &workspace.work, &[]);
    apply_base(&mut env, vec![set("FOO", "@/x")]).unwrap();
    assert_eq!(env.get("FOO"), Some("@/x"));
}

#[rstest]
fn test_config_applied_once(workspace: Workspace) {
    let mut repo = MemoryRepository::new();
    repo.insert_yaml(
        "A",
        "1",
        "/pkgs/A-1",
        "configs:\n  - name: default\n    statements:\n      - append: PATH\n        value: /a\n",
    )
    .unwrap();
    let (mut env, _) = environment(repo, &workspace.work, &[("PATH", "/usr/bin")]);

    let base = apply_base(&mut env, vec![include("A/1"), include("A/1")]).unwrap();
    env.apply_config(&base, DEFAULT_CONFIG, None).unwrap();

    assert_eq!(
        env.get("PATH"),
        Some(format!("/a{PATH_SEPARATOR}/usr/bin").as_str())
    );
    let a = env.get_package("A").unwrap();
    assert_eq!(a.applied_config_names(), vec![DEFAULT_CONFIG.to_string()]);
}

#[rstest]
#[case::include_last(vec![set("FOO", "base"), include("A/1")], "a")]
#[case::set_last(vec![include("A/1"), set("FOO", "base")], "base")]
fn test_later_statements_win(
    workspace: Workspace,
    #[case] statements: Vec<Statement>,
    #[case] expected: &str,
) {
    let mut repo = MemoryRepository::new();
    repo.insert_yaml(
        "A",
        "1",
        "/pkgs/A-1",
        "configs:\n  - name: default\n    statements:\n      - set: FOO\n        value: a\n",
    )
    .unwrap();
    let (mut env, _) = environment(repo, &workspace.work, &[]);

    apply_base(&mut env, statements).unwrap();
    assert_eq!(env.get("FOO"), Some(expected));
}

#[rstest]
fn test_missing_version(workspace: Workspace) {
    let (mut env, _) = environment(MemoryRepository::new(), &workspace.work, &[]);
    let err = apply_base(&mut env, vec![include("A")]).unwrap_err();
    assert!(matches!(err, Error::MissingVersion(name) if name == "A"));
}

#[rstest]
fn test_unknown_package_version(workspace: Workspace) {
    let (mut env, _) = environment(MemoryRepository::new(), &workspace.work, &[]);
    let err = apply_base(&mut env, vec![include("A/9")]).unwrap_err();
    assert!(matches!(err, Error::NotFound { name, version } if name == "A" && version == "9"));
}

fn diamond_repository(b_wants: &str) -> MemoryRepository {
    let mut repo = MemoryRepository::new();
    repo.insert_yaml(
        "A",
        "1",
        "/pkgs/A-1",
        "configs:\n  - name: default\n    statements:\n      - include: C/1\n",
    )
    .unwrap();
    repo.insert_yaml(
        "B",
        "1",
        "/pkgs/B-1",
        &format!("configs:\n  - name: default\n    statements:\n      - include: C/{b_wants}\n"),
    )
    .unwrap();
    for version in ["1", "2"] {
        repo.insert_yaml(
            "C",
            version,
            format!("/pkgs/C-{version}"),
            &format!(
                "configs:\n  - name: default\n    statements:\n      - set: C_VERSION\n        value: \"{version}\"\n"
            ),
        )
        .unwrap();
    }
    repo
}

#[rstest]
fn test_version_conflict_reports_both_chains(workspace: Workspace) {
    let (mut env, _) = environment(diamond_repository("2"), &workspace.work, &[]);

    let err = apply_base(&mut env, vec![include("A/1"), include("B/1")]).unwrap_err();
    let Error::VersionConflict {
        package,
        backtraces,
    } = err
    else {
        panic!("expected a version conflict, got {err:?}");
    };
    assert_eq!(package, "C");
    assert!(backtraces.contains("C/2 requested by:\nB/1\n  C/2"), "{backtraces}");
    assert!(backtraces.contains("C/1 resolved by:\nA/1\n  C/1"), "{backtraces}");
}

#[rstest]
fn test_shared_dependency_is_fetched_once(workspace: Workspace) {
    let (mut env, repo) = environment(diamond_repository("1"), &workspace.work, &[]);

    apply_base(&mut env, vec![include("A/1"), include("B/1")]).unwrap();

    assert_eq!(repo.fetched(), vec!["A/1", "C/1", "B/1"]);
    assert_eq!(env.get("C_VERSION"), Some("1"));
    let names = env
        .packages()
        .map(|p| p.to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["A/1", "B/1", "C/1"]);
}

#[rstest]
fn test_override_from_ancestor_wins(workspace: Workspace) {
    let (mut env, repo) = environment(diamond_repository("2"), &workspace.work, &[]);

    apply_base(
        &mut env,
        vec![include_with_overrides("A/1", &["C/2"]), include("B/1")],
    )
    .unwrap();

    assert_eq!(env.get_package("C").unwrap().version(), Some("2"));
    assert_eq!(env.get("C_VERSION"), Some("2"));
    assert!(!repo.fetched().contains(&"C/1".to_string()));
}

#[rstest]
fn test_nearest_override_wins(workspace: Workspace) {
    let mut repo = diamond_repository("1");
    repo.insert_yaml(
        "D",
        "1",
        "/pkgs/D-1",
        "configs:\n  - name: default\n    statements:\n      - include: A/1\n        overrides: [ C/2 ]\n",
    )
    .unwrap();
    let (mut env, _) = environment(repo, &workspace.work, &[]);

    apply_base(&mut env, vec![include_with_overrides("D/1", &["C/1"])]).unwrap();

    assert_eq!(env.get_package("C").unwrap().version(), Some("2"));
}

#[rstest]
fn test_self_include(workspace: Workspace) {
    let mut repo = MemoryRepository::new();
    repo.insert_yaml(
        "A",
        "1",
        "/pkgs/A-1",
        r#"
configs:
  - name: default
    statements:
      - include: ":extra"
      - set: SEEN
        value: default
  - name: extra
    statements:
      - set: EXTRA
        value: "@/extra"
"#,
    )
    .unwrap();
    let (mut env, repo) = environment(repo, &workspace.work, &[]);

    apply_base(&mut env, vec![include("A/1")]).unwrap();

    assert_eq!(env.get("EXTRA"), Some("/pkgs/A-1/extra"));
    assert_eq!(env.get("SEEN"), Some("default"));
    assert_eq!(repo.fetched(), vec!["A/1"]);
}

#[rstest]
fn test_base_package_self_include(workspace: Workspace) {
    let (mut env, _) = environment(MemoryRepository::new(), &workspace.work, &[]);
    let base = base_package(vec![
        (DEFAULT_CONFIG, vec![include(":other")]),
        ("other", vec![set("Y", "2")]),
    ]);

    env.apply_config(&base, DEFAULT_CONFIG, None).unwrap();

    assert_eq!(env.get("Y"), Some("2"));
    assert!(base.has_applied_config("other"));
}

#[rstest]
fn test_unknown_config(workspace: Workspace) {
    let mut repo = MemoryRepository::new();
    repo.insert_yaml("A", "1", "/pkgs/A-1", "configs:\n  - name: default\n")
        .unwrap();
    let (mut env, _) = environment(repo, &workspace.work, &[]);

    let err = apply_base(&mut env, vec![include("A:debug/1")]).unwrap_err();
    assert!(matches!(err, Error::UnknownConfig { config, .. } if config == "debug"));
}

#[rstest]
fn test_register_duplicate_name(workspace: Workspace) {
    let (mut env, _) = environment(MemoryRepository::new(), &workspace.work, &[]);
    let package = || Package::new(Some("A".into()), Some("1".into()), "/a", vec![]).unwrap();

    env.register_package(package()).unwrap();
    let err = env.register_package(package()).unwrap_err();
    assert!(matches!(err, Error::DuplicateName(name) if name == "A"));

    let unnamed = Package::new(None, None, "/a", vec![]).unwrap();
    assert!(matches!(
        env.register_package(unnamed),
        Err(Error::Internal(_))
    ));
}

#[rstest]
fn test_config_name_for(workspace: Workspace) {
    let (mut env, _) = environment(MemoryRepository::new(), &workspace.work, &[]);
    env.register_package(
        Package::new(Some("A".into()), Some("1".into()), "/a", vec![])
            .unwrap()
            .with_primary_config("build"),
    )
    .unwrap();

    assert_eq!(env.config_name_for("A"), "build");
    assert_eq!(env.config_name_for("B"), DEFAULT_CONFIG);
}

fn tool_repository() -> MemoryRepository {
    let mut repo = MemoryRepository::new();
    repo.insert_yaml(
        "A",
        "1",
        "/pkgs/A-1",
        r#"
configs:
  - name: default
    statements:
      - set: FIG_TEST_EXEC
        value: "@"
      - command: "@/bin/tool --flag"
  - name: quiet
    statements:
      - set: UNUSED
        value: x
"#,
    )
    .unwrap();
    repo
}

#[rstest]
#[serial]
fn test_execute_config_runs_expanded_command(workspace: Workspace) {
    let (mut env, _) = environment(tool_repository(), &workspace.work, &[]);
    let base = apply_base(&mut env, vec![include("A/1")]).unwrap();

    let argv = env
        .execute_config(
            &base,
            &"A".parse().unwrap(),
            &["extra".to_string()],
            |argv| {
                assert_eq!(std::env::var("FIG_TEST_EXEC").unwrap(), "/pkgs/A-1");
                Ok(argv)
            },
        )
        .unwrap();

    assert_eq!(argv, vec!["/pkgs/A-1/bin/tool", "--flag", "extra"]);
    assert!(std::env::var_os("FIG_TEST_EXEC").is_none());
}

#[rstest]
#[serial]
fn test_execute_config_without_command(workspace: Workspace) {
    let (mut env, _) = environment(tool_repository(), &workspace.work, &[]);
    let base = apply_base(&mut env, vec![]).unwrap();

    let err = env
        .execute_config(&base, &"A:quiet/1".parse().unwrap(), &[], |_| Ok(()))
        .unwrap_err();
    assert!(
        matches!(err, Error::NoCommand { ref package, ref config } if package == "A/1" && config == "quiet"),
        "{err:?}"
    );
}

/// Runs `body` with `FIG_TEST_EXEC` preset, then checks it was put back.
fn with_preset_exec_variable(body: impl FnOnce()) {
    // SAFETY: only called from tests serialized on the environment.
    unsafe { std::env::set_var("FIG_TEST_EXEC", "before") };
    body();
    let restored = std::env::var("FIG_TEST_EXEC");
    // SAFETY: as above.
    unsafe { std::env::remove_var("FIG_TEST_EXEC") };
    assert_eq!(restored.unwrap(), "before");
}

#[rstest]
#[serial]
fn test_execute_config_restores_environment_when_launch_fails(workspace: Workspace) {
    let (mut env, _) = environment(tool_repository(), &workspace.work, &[]);
    let base = apply_base(&mut env, vec![include("A/1")]).unwrap();

    with_preset_exec_variable(|| {
        let err = env
            .execute_config(&base, &"A".parse().unwrap(), &[], |_| -> Result<()> {
                assert_eq!(std::env::var("FIG_TEST_EXEC").unwrap(), "/pkgs/A-1");
                Err(Error::Internal("launch failed".to_string()))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Internal(message) if message == "launch failed"));
    });
}

#[rstest]
#[serial]
fn test_execute_shell_restores_environment_when_child_fails(workspace: Workspace) {
    let (mut env, _) = environment(tool_repository(), &workspace.work, &[]);
    apply_base(&mut env, vec![include("A/1")]).unwrap();

    with_preset_exec_variable(|| {
        let err = env
            .execute_shell(&["false".to_string()], |_| -> Result<()> {
                assert_eq!(std::env::var("FIG_TEST_EXEC").unwrap(), "/pkgs/A-1");
                Err(Error::Io(std::io::Error::other("child exited with 1")))
            })
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    });
}

#[rstest]
#[serial]
fn test_execute_shell_expands_package_references(workspace: Workspace) {
    let (mut env, _) = environment(tool_repository(), &workspace.work, &[]);
    apply_base(&mut env, vec![include("A/1")]).unwrap();

    let command = ["echo", "@A/lib", "\\@A", "@"].map(String::from);
    let argv = env.execute_shell(&command, Ok).unwrap();
    assert_eq!(argv, vec!["echo", "/pkgs/A-1/lib", "@A", "@"]);

    let err = env
        .execute_shell(&["@missing".to_string()], |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, Error::PackageNotFound(name) if name == "missing"));
}

fn retrieving_repository(workspace: &Workspace, version: &str, yaml: &str) -> MemoryRepository {
    let mut repo = MemoryRepository::new();
    repo.insert_yaml("A", version, workspace.package_dir("A", version), yaml)
        .unwrap();
    repo
}

#[rstest]
fn test_retrieve_copies_file_by_basename(workspace: Workspace) {
    workspace.write_package_file("A", "1", "lib/libfoo.so", "so");
    let repo = retrieving_repository(
        &workspace,
        "1",
        "configs:\n  - name: default\n    statements:\n      - append: LIBPATH\n        value: \"@/lib/libfoo.so\"\n",
    );
    let (mut env, _) = environment(repo, &workspace.work, &[]);
    env.add_retrieve("LIBPATH", "lib/[package]");

    apply_base(&mut env, vec![include("A/1")]).unwrap();

    assert_eq!(env.get("LIBPATH"), Some("lib/A/libfoo.so"));
    assert_eq!(
        std::fs::read_to_string(workspace.work.join("lib/A/libfoo.so")).unwrap(),
        "so"
    );
    let record = env.retriever().record("A").unwrap();
    assert!(record.files.contains("lib/A/libfoo.so"));
}

#[rstest]
fn test_retrieve_absolute_destination_stays_in_working_directory(workspace: Workspace) {
    workspace.write_package_file("A", "1", "lib/libfoo.so", "so");
    let repo = retrieving_repository(
        &workspace,
        "1",
        "configs:\n  - name: default\n    statements:\n      - append: LIBPATH\n        value: \"@/lib/libfoo.so\"\n",
    );
    let (mut env, _) = environment(repo, &workspace.work, &[]);
    let outside = workspace.tmp.path().join("outside");
    env.add_retrieve("LIBPATH", format!("{}/[package]", outside.display()));

    apply_base(&mut env, vec![include("A/1")]).unwrap();

    let expected = format!("{}/A/libfoo.so", outside.display())
        .trim_start_matches('/')
        .to_string();
    assert_eq!(env.get("LIBPATH"), Some(expected.as_str()));
    assert!(workspace.work.join(&expected).is_file());
    assert!(!outside.exists());
}

#[rstest]
fn test_retrieve_destination_with_parent_component(workspace: Workspace) {
    workspace.write_package_file("A", "1", "lib/libfoo.so", "so");
    let repo = retrieving_repository(
        &workspace,
        "1",
        "configs:\n  - name: default\n    statements:\n      - append: LIBPATH\n        value: \"@/lib/libfoo.so\"\n",
    );
    let (mut env, _) = environment(repo, &workspace.work, &[]);
    env.add_retrieve("LIBPATH", "../[package]");

    let err = apply_base(&mut env, vec![include("A/1")]).unwrap_err();
    assert!(matches!(err, Error::OutsideWorkingDir(path) if path == "../A/libfoo.so"));
    assert!(!workspace.tmp.path().join("A").exists());
}

#[rstest]
fn test_retrieve_preserves_marked_sub_path(workspace: Workspace) {
    workspace.write_package_file("A", "1", "include/foo/foo.h", "h");
    let repo = retrieving_repository(
        &workspace,
        "1",
        "configs:\n  - name: default\n    statements:\n      - set: INCLUDE\n        value: \"@//include/foo/foo.h\"\n",
    );
    let (mut env, _) = environment(repo, &workspace.work, &[]);
    env.add_retrieve("INCLUDE", "inc");

    apply_base(&mut env, vec![include("A/1")]).unwrap();

    assert_eq!(env.get("INCLUDE"), Some("inc/include/foo/foo.h"));
    assert!(workspace.work.join("inc/include/foo/foo.h").is_file());
}

#[rstest]
fn test_retrieve_directory(workspace: Workspace) {
    workspace.write_package_file("A", "1", "share/a.txt", "a");
    workspace.write_package_file("A", "1", "share/nested/b.txt", "b");
    let repo = retrieving_repository(
        &workspace,
        "1",
        "configs:\n  - name: default\n    statements:\n      - set: SHARE\n        value: \"@/share\"\n",
    );
    let (mut env, _) = environment(repo, &workspace.work, &[]);
    env.add_retrieve("SHARE", "share/[package]");

    apply_base(&mut env, vec![include("A/1")]).unwrap();

    assert_eq!(env.get("SHARE"), Some("share/A"));
    assert!(workspace.work.join("share/A/a.txt").is_file());
    assert!(workspace.work.join("share/A/nested/b.txt").is_file());
}

#[rstest]
fn test_retrieve_new_version_replaces_old_files(workspace: Workspace) {
    let yaml = |file: &str| {
        format!(
            "configs:\n  - name: default\n    statements:\n      - set: TOOL\n        value: \"@/{file}\"\n"
        )
    };
    workspace.write_package_file("A", "1", "old.txt", "one");
    workspace.write_package_file("A", "2", "new.txt", "two");

    {
        let repo = retrieving_repository(&workspace, "1", &yaml("old.txt"));
        let (mut env, _) = environment(repo, &workspace.work, &[]);
        env.add_retrieve("TOOL", "bin");
        apply_base(&mut env, vec![include("A/1")]).unwrap();
        env.save_retrieves().unwrap();
    }
    assert!(workspace.work.join("bin/old.txt").is_file());

    let repo = retrieving_repository(&workspace, "2", &yaml("new.txt"));
    let (mut env, _) = environment(repo, &workspace.work, &[]);
    env.add_retrieve("TOOL", "bin");
    apply_base(&mut env, vec![include("A/2")]).unwrap();
    env.save_retrieves().unwrap();

    assert!(!workspace.work.join("bin/old.txt").exists());
    assert!(workspace.work.join("bin/new.txt").is_file());
    assert_eq!(
        std::fs::read_to_string(workspace.work.join(".fig/retrieve")).unwrap(),
        "bin/new.txt=A/2\n"
    );
}

#[rstest]
fn test_add_retrieves_from_package(workspace: Workspace) {
    let (mut env, _) = environment(MemoryRepository::new(), &workspace.work, &[]);
    let package = crate::definition::PackageDefinition::from_yaml("retrieves:\n  LIBPATH: lib\n")
        .unwrap()
        .into_package(None, None, "/work")
        .unwrap();

    env.add_retrieves_from(&package);

    assert_eq!(env.retrieve_vars.get("LIBPATH").map(String::as_str), Some("lib"));
}

#[rstest]
#[case("/a/b//c/d", Some("c/d"))]
#[case("/a/b//c//d", Some("d"))]
#[case("/a/b//", None)]
#[case("/a/b/c", None)]
fn test_preserved_path(#[case] file: &str, #[case] expected: Option<&str>) {
    assert_eq!(preserved_path(file), expected);
}
