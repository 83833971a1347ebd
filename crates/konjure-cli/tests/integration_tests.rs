//! Integration tests for CLI commands

use std::io::Write;
use std::process::{Command, Output, Stdio};

/// Helper to run konjure from the fixtures directory
fn konjure(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_konjure"))
        .args(args)
        .current_dir(fixtures_path())
        .stdin(Stdio::null())
        .output()
        .expect("Failed to execute konjure")
}

/// Get the fixtures path
fn fixtures_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/../../fixtures")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

mod expand_command {
    use super::*;

    #[test]
    fn test_expand_file() {
        let output = konjure(&["manifests/app.yaml"]);

        assert!(output.status.success(), "Expected success for a local file");
        let stdout = stdout(&output);
        assert!(stdout.contains("kind: Deployment"));
        assert!(stdout.contains("---\napiVersion: v1\nkind: Service"));
        // Stripped by default
        assert!(!stdout.contains("status:"));
        assert!(!stdout.contains("# Web frontend"));
        assert!(!stdout.contains("config.kubernetes.io/path"));
    }

    #[test]
    fn test_keep_status_and_comments() {
        let output = konjure(&["--keep-status", "--keep-comments", "manifests/app.yaml"]);

        assert!(output.status.success());
        let stdout = stdout(&output);
        assert!(stdout.starts_with("# Web frontend\n"));
        assert!(stdout.contains("status:"));
    }

    #[test]
    fn test_directory_name_output() {
        let output = konjure(&["-o", "name", "manifests"]);

        assert!(output.status.success());
        assert_eq!(
            stdout(&output),
            "deployment.apps/web\nservice/web\nconfigmap/web-settings\n"
        );
    }

    #[test]
    fn test_install_sort_order() {
        let output = konjure(&["-o", "name", "--sort-order", "install", "manifests"]);

        assert!(output.status.success());
        assert_eq!(
            stdout(&output),
            "configmap/web-settings\nservice/web\ndeployment.apps/web\n"
        );
    }

    #[test]
    fn test_kind_pattern() {
        let output = konjure(&["-o", "name", "--kind", "Service|ConfigMap", "manifests"]);

        assert!(output.status.success());
        assert_eq!(stdout(&output), "service/web\nconfigmap/web-settings\n");
    }

    #[test]
    fn test_json_output() {
        let output = konjure(&["-o", "json", "manifests/app.yaml"]);

        assert!(output.status.success());
        let stdout = stdout(&output);
        let docs: Vec<serde_json::Value> = stdout
            .lines()
            .map(|l| serde_json::from_str(l).expect("Each line should be valid JSON"))
            .collect();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["kind"], "Deployment");
        assert_eq!(docs[1]["metadata"]["name"], "web");
    }

    #[test]
    fn test_env_output_resolves_config_map_refs() {
        let output = konjure(&["-o", "env", "--shell", "manifests"]);

        assert!(output.status.success());
        assert_eq!(stdout(&output), "export LOG_LEVEL=\"info\"\n");
    }

    #[test]
    fn test_resource_spec_is_expanded() {
        let output = konjure(&["-o", "name", "specs/resources.yaml"]);

        assert!(output.status.success());
        assert_eq!(stdout(&output), "configmap/web-settings\n");
    }

    #[test]
    fn test_depth_limits_expansion() {
        let output = konjure(&["-o", "name", "--depth", "1", "specs/resources.yaml"]);

        assert!(output.status.success());
        // One iteration only reads the file holding the Resource spec
        assert_eq!(stdout(&output), "resource.konjure.stormforge.io/\n");
    }

    #[test]
    fn test_stdin_is_default_input() {
        let mut child = Command::new(env!("CARGO_BIN_EXE_konjure"))
            .args(["-o", "name"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .expect("Failed to execute konjure");
        child
            .stdin
            .take()
            .unwrap()
            .write_all(b"apiVersion: v1\nkind: Namespace\nmetadata:\n  name: demo\n")
            .unwrap();
        let output = child.wait_with_output().unwrap();

        assert!(output.status.success());
        assert_eq!(stdout(&output), "namespace/demo\n");
    }
}

mod exit_codes {
    use super::*;

    #[test]
    fn test_missing_file_is_io_error() {
        let output = konjure(&["does-not-exist.yaml"]);
        assert_eq!(output.status.code(), Some(5));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("does-not-exist.yaml"));
    }

    #[test]
    fn test_unknown_kind_is_spec_error() {
        let output = konjure(&["specs/unknown-kind.yaml"]);
        assert_eq!(output.status.code(), Some(2));
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(stderr.contains("Gti"));
    }

    #[test]
    fn test_unknown_scheme_is_spec_error() {
        let output = konjure(&["svn::example.com/repo"]);
        assert_eq!(output.status.code(), Some(2));
    }

    #[test]
    fn test_bad_flags_are_usage_errors() {
        assert_eq!(konjure(&["--no-such-flag"]).status.code(), Some(64));
        assert_eq!(
            konjure(&["--sort-order", "sideways", "manifests"]).status.code(),
            Some(64)
        );
        assert_eq!(konjure(&["-o", "xml", "manifests"]).status.code(), Some(64));
    }

    #[test]
    fn test_help_succeeds() {
        let output = konjure(&["--help"]);
        assert!(output.status.success());
        assert!(stdout(&output).contains("helm-values"));
    }
}

mod helm_values_command {
    use super::*;

    fn values(args: &[&str]) -> serde_json::Value {
        let mut argv = vec!["helm-values"];
        argv.extend_from_slice(args);
        let output = konjure(&argv);
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
        let yaml: serde_yaml::Value = serde_yaml::from_str(&stdout(&output)).unwrap();
        serde_json::to_value(yaml).unwrap()
    }

    #[test]
    fn test_later_flags_win() {
        let merged = values(&[
            "-f",
            "values/base.yaml",
            "--set",
            "replicas=3",
            "-f",
            "values/override.yaml",
        ]);
        assert_eq!(merged["replicas"], 5);
        assert_eq!(merged["image"]["repository"], "nginx");
        assert_eq!(merged["image"]["tag"], "1.26");

        let merged = values(&[
            "-f",
            "values/base.yaml",
            "-f",
            "values/override.yaml",
            "--set",
            "replicas=3",
        ]);
        assert_eq!(merged["replicas"], 3);
    }

    #[test]
    fn test_set_string() {
        let merged = values(&["--set-string", "image.tag=2"]);
        assert_eq!(merged["image"]["tag"], "2");
    }

    #[test]
    fn test_missing_values_file() {
        let output = konjure(&["helm-values", "-f", "values/nope.yaml"]);
        assert_eq!(output.status.code(), Some(5));
    }
}
