//! Command-line parsing and configuration layering tests.

use clap::Parser;
use serial_test::serial;
use std::io::Write;
use sweeper::cli::{Cli, Commands};
use sweeper::commands::resolve_config;
use sweeper::tracing::{LogLevel, TracingFormat};
use sweeper_core::config::OwnerKind;

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(args).unwrap()
}

/// Clear every variable that feeds the configuration.
fn clean_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
    let mut all: Vec<(&str, Option<&str>)> = ["GITHUB_REPOSITORY", "GITHUB_API_URL", "GITHUB_STEP_SUMMARY"]
        .into_iter()
        .filter(|name| !vars.iter().any(|(key, _)| key == name))
        .map(|name| (name, None))
        .collect();
    all.extend_from_slice(vars);
    temp_env::with_vars(all, f);
}

mod parsing {
    use super::*;

    #[test]
    #[serial]
    fn test_global_defaults() {
        clean_env(&[], || {
            let cli = parse(&["sweeper", "cache"]);
            assert_eq!(cli.level, LogLevel::Info);
            assert_eq!(cli.log_format, TracingFormat::Pretty);
            assert!(!cli.json);
            assert!(cli.summary_file.is_none());
            assert!(matches!(cli.command, Commands::Cache(_)));
        });
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&[
            "sweeper",
            "registry",
            "--json",
            "--level",
            "debug",
            "--log-format",
            "json",
        ]);
        assert!(cli.json);
        assert_eq!(cli.level, LogLevel::Debug);
        assert_eq!(cli.log_format, TracingFormat::Json);
    }

    #[test]
    #[serial]
    fn test_summary_file_from_env() {
        clean_env(&[("GITHUB_STEP_SUMMARY", Some("/tmp/step-summary.md"))], || {
            let cli = parse(&["sweeper", "cache"]);
            assert_eq!(
                cli.summary_file.as_deref(),
                Some(std::path::Path::new("/tmp/step-summary.md"))
            );
        });
    }

    #[test]
    fn test_subcommands() {
        assert!(matches!(parse(&["sweeper", "show-config"]).command, Commands::ShowConfig));
        assert!(matches!(parse(&["sweeper", "version"]).command, Commands::Version));
    }

    #[test]
    fn test_invalid_input_rejected() {
        assert!(Cli::try_parse_from(["sweeper"]).is_err());
        assert!(Cli::try_parse_from(["sweeper", "cache", "--idle-days", "soon"]).is_err());
        assert!(Cli::try_parse_from(["sweeper", "--log-format", "xml", "cache"]).is_err());
        assert!(Cli::try_parse_from(["sweeper", "cache", "--package", "x"]).is_err());
    }
}

mod layering {
    use super::*;

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_file_env_and_flags_in_order() {
        let file = config_file(
            r#"
            [github]
            repository = "file/repo"

            [cache]
            idle_days = 5
            max_age_days = 10

            [execution]
            concurrency = 2
            "#,
        );
        let path = file.path().to_str().unwrap().to_string();

        clean_env(&[("GITHUB_REPOSITORY", Some("env/repo"))], || {
            let cli = parse(&["sweeper", "--config", &path, "cache", "--idle-days", "1"]);
            let config = resolve_config(&cli).unwrap();

            // flag beats file
            assert_eq!(config.cache.idle_days, 1);
            // file beats default
            assert_eq!(config.cache.max_age_days, 10);
            assert_eq!(config.execution.concurrency, 2);
            // env beats file
            assert_eq!(config.github.repository.as_deref(), Some("env/repo"));
        });
    }

    #[test]
    #[serial]
    fn test_repo_flag_beats_env() {
        clean_env(&[("GITHUB_REPOSITORY", Some("env/repo"))], || {
            let file = config_file("");
            let path = file.path().to_str().unwrap().to_string();
            let cli = parse(&["sweeper", "--config", &path, "--repo", "flag/repo", "registry", "--org"]);
            let config = resolve_config(&cli).unwrap();
            assert_eq!(config.github.repository.as_deref(), Some("flag/repo"));
            assert_eq!(config.github.owner_kind, OwnerKind::Org);
        });
    }

    #[test]
    #[serial]
    fn test_bad_config_file_is_a_config_error() {
        let file = config_file("[cache]\nidle_days = \"three\"\n");
        let path = file.path().to_str().unwrap().to_string();
        clean_env(&[], || {
            let cli = parse(&["sweeper", "--config", &path, "show-config"]);
            let err = resolve_config(&cli).unwrap_err();
            assert_eq!(sweeper::cli::exit_code_for(&err), sweeper::cli::EXIT_CONFIG);
        });
    }

    #[test]
    #[serial]
    fn test_missing_token_fails_before_any_call() {
        clean_env(&[("GITHUB_TOKEN", None), ("GH_TOKEN", None)], || {
            let file = config_file("[github]\nrepository = \"acme/widgets\"\n");
            let path = file.path().to_str().unwrap().to_string();
            let cli = parse(&["sweeper", "--config", &path, "cache"]);

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let err = runtime
                .block_on(sweeper::commands::execute(cli))
                .unwrap_err();
            assert_eq!(sweeper::cli::exit_code_for(&err), sweeper::cli::EXIT_CONFIG);
        });
    }
}
