use std::ffi::OsStr;
use std::path::Path;

use script_commander::supervisor::command::merge_paths;
use script_commander::supervisor::{CommandBuilder, ShellEnvironment};
use script_commander::AppError;

#[test]
fn merge_keeps_primary_first_and_dedupes() {
    let merged = merge_paths(
        OsStr::new("/opt/node/bin:/usr/bin"),
        Some(OsStr::new("/usr/bin:/bin")),
    );
    let entries: Vec<_> = std::env::split_paths(&merged).collect();
    assert_eq!(
        entries,
        vec![
            Path::new("/opt/node/bin").to_path_buf(),
            Path::new("/usr/bin").to_path_buf(),
            Path::new("/bin").to_path_buf(),
        ]
    );
}

#[test]
fn missing_project_directory_is_spawn_error() {
    let builder = CommandBuilder::new("npm", ShellEnvironment::inherit());
    let result = builder.run_script(Path::new("/definitely/not/here"), "build");
    assert!(matches!(result, Err(AppError::Spawn(msg)) if msg.contains("does not exist")));
}

#[test]
fn unknown_package_manager_is_spawn_error() {
    let project = tempfile::tempdir().expect("tempdir");
    let empty_bin = tempfile::tempdir().expect("tempdir");
    let builder = CommandBuilder::new(
        "no-such-package-manager",
        ShellEnvironment::from_path(empty_bin.path()),
    );

    let result = builder.run_script(project.path(), "build");
    assert!(matches!(result, Err(AppError::Spawn(msg)) if msg.contains("cannot find")));
}

#[cfg(unix)]
mod resolved {
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;

    use script_commander::supervisor::{CommandBuilder, ShellEnvironment};

    fn fake_bin(dir: &Path, name: &str) {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").expect("write");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    #[test]
    fn run_command_resolves_through_shell_path() {
        let project = tempfile::tempdir().expect("tempdir");
        let bin = tempfile::tempdir().expect("tempdir");
        fake_bin(bin.path(), "pnpm");

        let builder = CommandBuilder::new("pnpm", ShellEnvironment::from_path(bin.path()));
        let spec = builder.run_script(project.path(), "dev").expect("spec");

        assert_eq!(spec.program, bin.path().join("pnpm"));
        assert_eq!(spec.args, vec!["run", "dev"]);
        assert_eq!(spec.cwd, project.path());
        assert!(spec
            .env
            .iter()
            .any(|(key, value)| key == "PATH" && value.as_os_str() == bin.path().as_os_str()));
        assert!(spec
            .env
            .iter()
            .any(|(key, value)| key == "FORCE_COLOR" && value == "1"));
    }

    #[test]
    fn install_uses_configured_args_without_color() {
        let project = tempfile::tempdir().expect("tempdir");
        let bin = tempfile::tempdir().expect("tempdir");
        fake_bin(bin.path(), "npm");

        let builder = CommandBuilder::new("npm", ShellEnvironment::from_path(bin.path()))
            .with_install_args(vec!["ci".into()])
            .with_force_color(false);
        let spec = builder.install(project.path()).expect("spec");

        assert_eq!(spec.args, vec!["ci"]);
        assert!(spec.env.iter().all(|(key, _)| key != "FORCE_COLOR"));
        assert!(spec.display().ends_with("npm ci"));
    }
}

#[cfg(unix)]
mod login_shell {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use script_commander::supervisor::ShellEnvironment;
    use serial_test::serial;

    fn fake_shell(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("fake-shell");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        path
    }

    #[tokio::test]
    #[serial]
    async fn captured_path_keeps_inherited_entries() {
        let captured = ShellEnvironment::capture("/bin/sh", Duration::from_secs(5)).await;
        let captured_path = captured.path().expect("captured PATH");
        let entries: Vec<_> = std::env::split_paths(captured_path).collect();

        if let Some(inherited) = ShellEnvironment::inherit().path() {
            for entry in std::env::split_paths(inherited) {
                assert!(entries.contains(&entry), "missing inherited entry {entry:?}");
            }
        }
    }

    #[tokio::test]
    #[serial]
    async fn login_entries_come_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shell = fake_shell(
            dir.path(),
            "printf 'banner\\n__SCRIPT_COMMANDER_PATH__=/opt/login/bin\\n'",
        );

        let captured =
            ShellEnvironment::capture(shell.to_str().expect("utf8"), Duration::from_secs(5)).await;
        let entries: Vec<_> =
            std::env::split_paths(captured.path().expect("captured PATH")).collect();
        assert_eq!(entries.first(), Some(&PathBuf::from("/opt/login/bin")));
    }

    #[tokio::test]
    #[serial]
    async fn missing_shell_falls_back_to_inherited() {
        let captured =
            ShellEnvironment::capture("/nonexistent/shell", Duration::from_secs(5)).await;
        assert_eq!(captured, ShellEnvironment::inherit());
    }

    #[tokio::test]
    #[serial]
    async fn failing_shell_falls_back_to_inherited() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shell = fake_shell(dir.path(), "exit 1");

        let captured =
            ShellEnvironment::capture(shell.to_str().expect("utf8"), Duration::from_secs(5)).await;
        assert_eq!(captured, ShellEnvironment::inherit());
    }

    #[tokio::test]
    #[serial]
    async fn shell_without_marker_falls_back_to_inherited() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shell = fake_shell(dir.path(), "echo hello");

        let captured =
            ShellEnvironment::capture(shell.to_str().expect("utf8"), Duration::from_secs(5)).await;
        assert_eq!(captured, ShellEnvironment::inherit());
    }

    #[tokio::test]
    #[serial]
    async fn slow_shell_times_out_to_inherited() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shell = fake_shell(dir.path(), "sleep 5");

        let captured =
            ShellEnvironment::capture(shell.to_str().expect("utf8"), Duration::from_millis(200))
                .await;
        assert_eq!(captured, ShellEnvironment::inherit());
    }
}
