//! Command line and environment parsing

use anyhow::{bail, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;
use tagwarden_core::{FleetConfig, MonitorConfig};
use tagwarden_harbor::HarborConfig;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Everything the binary needs to run
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(crate) harbor: HarborConfig,
    pub(crate) fleet: FleetConfig,
    pub(crate) log_format: LogFormat,
    pub(crate) json_report: bool,
}

pub(crate) fn command() -> Command {
    Command::new("tagwarden")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Enforce tag immutability and retention across Harbor projects")
        .arg(
            Arg::new("url")
                .long("url")
                .env("HARBOR_URL")
                .required(true)
                .help("Harbor host or URL (a bare host is reached over HTTPS)"),
        )
        .arg(
            Arg::new("username")
                .long("username")
                .env("HARBOR_USERNAME")
                .required(true)
                .help("Harbor username"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .env("HARBOR_PASSWORD")
                .hide_env_values(true)
                .required(true)
                .help("Harbor password or robot secret"),
        )
        .arg(
            Arg::new("exclude")
                .long("exclude")
                .env("TAGWARDEN_EXCLUDE")
                .action(ArgAction::Append)
                .value_delimiter(',')
                .help("Additional project names to skip (repeatable)"),
        )
        .arg(
            Arg::new("concurrency")
                .long("concurrency")
                .env("TAGWARDEN_CONCURRENCY")
                .default_value("1")
                .value_parser(value_parser!(usize))
                .help("Projects processed at once"),
        )
        .arg(
            Arg::new("execute")
                .long("execute")
                .env("TAGWARDEN_EXECUTE")
                .action(ArgAction::SetTrue)
                .help("Run retention for real instead of as a dry run"),
        )
        .arg(
            Arg::new("await-timeout")
                .long("await-timeout")
                .env("TAGWARDEN_AWAIT_TIMEOUT")
                .value_parser(value_parser!(u64))
                .help("Seconds to wait for an execution to finish (default: no limit)"),
        )
        .arg(
            Arg::new("page-size")
                .long("page-size")
                .env("TAGWARDEN_PAGE_SIZE")
                .default_value("100")
                .value_parser(value_parser!(u32))
                .help("Page size for registry listings"),
        )
        .arg(
            Arg::new("request-timeout")
                .long("request-timeout")
                .env("TAGWARDEN_REQUEST_TIMEOUT")
                .default_value("30")
                .value_parser(value_parser!(u64))
                .help("Per-request timeout in seconds"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .env("TAGWARDEN_LOG_FORMAT")
                .default_value("text")
                .value_parser(["text", "json"])
                .help("Log output format"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the final report as JSON"),
        )
}

impl Settings {
    pub(crate) fn from_matches(matches: &ArgMatches) -> anyhow::Result<Self> {
        let url = required(matches, "url")?;
        let username = required(matches, "username")?;
        let password = required(matches, "password")?;

        let page_size = *matches.get_one::<u32>("page-size").unwrap_or(&100);
        if page_size == 0 {
            bail!("--page-size must be at least 1");
        }
        let request_timeout = *matches.get_one::<u64>("request-timeout").unwrap_or(&30);

        let harbor = HarborConfig::new(url, username, password)
            .context("invalid Harbor connection settings")?
            .with_page_size(page_size)
            .with_request_timeout(Duration::from_secs(request_timeout));

        let mut monitor = MonitorConfig::default().with_await_deadline(
            matches
                .get_one::<u64>("await-timeout")
                .filter(|secs| **secs > 0)
                .map(|secs| Duration::from_secs(*secs)),
        );
        monitor.page_size = page_size;

        let exclusions = matches
            .get_many::<String>("exclude")
            .into_iter()
            .flatten()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        let fleet = FleetConfig::new()
            .with_exclusions(exclusions)
            .with_dry_run(!matches.get_flag("execute"))
            .with_concurrency(*matches.get_one::<usize>("concurrency").unwrap_or(&1))
            .with_monitor(monitor);

        let log_format = match matches.get_one::<String>("log-format").map(String::as_str) {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            harbor,
            fleet,
            log_format,
            json_report: matches.get_flag("json"),
        })
    }
}

fn required<'a>(matches: &'a ArgMatches, id: &str) -> anyhow::Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("missing --{id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(extra: &[&str]) -> Settings {
        let mut args = vec![
            "tagwarden",
            "--url",
            "harbor.example.com",
            "--username",
            "admin",
            "--password",
            "pw",
        ];
        args.extend_from_slice(extra);
        let matches = command().try_get_matches_from(args).unwrap();
        Settings::from_matches(&matches).unwrap()
    }

    #[test]
    fn command_is_well_formed() {
        command().debug_assert();
    }

    #[test]
    fn defaults_match_a_plain_dry_run() {
        let settings = parse(&[]);

        assert_eq!(settings.harbor.base_url(), "https://harbor.example.com/api/v2.0");
        assert!(settings.fleet.dry_run);
        assert_eq!(settings.fleet.concurrency, 1);
        assert_eq!(settings.fleet.monitor, MonitorConfig::default());
        assert!(settings.fleet.is_excluded("library"));
        assert_eq!(settings.log_format, LogFormat::Text);
        assert!(!settings.json_report);
    }

    #[test]
    fn flags_override_defaults() {
        let settings = parse(&[
            "--execute",
            "--concurrency",
            "4",
            "--await-timeout",
            "600",
            "--page-size",
            "50",
            "--exclude",
            "staging",
            "--exclude",
            "qa,perf",
            "--log-format",
            "json",
            "--json",
        ]);

        assert!(!settings.fleet.dry_run);
        assert_eq!(settings.fleet.concurrency, 4);
        assert_eq!(
            settings.fleet.monitor.await_deadline,
            Some(Duration::from_secs(600))
        );
        assert_eq!(settings.fleet.monitor.page_size, 50);
        assert_eq!(settings.harbor.page_size, 50);
        for name in ["staging", "qa", "perf", "library"] {
            assert!(settings.fleet.is_excluded(name), "{name} should be excluded");
        }
        assert_eq!(settings.log_format, LogFormat::Json);
        assert!(settings.json_report);
    }

    #[test]
    fn zero_await_timeout_means_unbounded() {
        let settings = parse(&["--await-timeout", "0"]);
        assert_eq!(settings.fleet.monitor.await_deadline, None);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let matches = command()
            .try_get_matches_from([
                "tagwarden",
                "--url",
                "h",
                "--username",
                "u",
                "--password",
                "p",
                "--page-size",
                "0",
            ])
            .unwrap();
        assert!(Settings::from_matches(&matches).is_err());
    }
}
