//! Command line front end for the XVIZ replay server.

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use xviz_replay::{ServeConfig, XvizReplay};

const DEFAULT_DATA_ROOT: &str = "data/generated";

fn cli() -> Command {
    Command::new("xviz-serve")
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("data_directory")
                .short('d')
                .long("data_directory")
                .value_name("DIR")
                .help("Directory to serve frames from; relative names resolve against --data_root")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("data_root")
                .long("data_root")
                .value_name("DIR")
                .help("Base for relative data directories")
                .default_value(DEFAULT_DATA_ROOT)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("WebSocket port")
                .value_parser(value_parser!(u16)),
        )
        .arg(
            Arg::new("frame_limit")
                .long("frame_limit")
                .value_name("COUNT")
                .help("Number of frames to send; above the frame count playback loops")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("send_interval")
                .long("send_interval")
                .visible_alias("interval")
                .value_name("MS")
                .help("Milliseconds between frames")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("live")
                .long("live")
                .help("Loop forever, shifting timestamps so they keep increasing")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("skip_images")
                .long("skip_images")
                .help("Drop image primitives before sending frames")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("YAML configuration; command line flags take precedence")
                .value_parser(value_parser!(PathBuf)),
        )
}

fn build_config(matches: &ArgMatches) -> anyhow::Result<ServeConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => ServeConfig::from_yaml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ServeConfig::default(),
    };

    if let Some(directory) = matches.get_one::<PathBuf>("data_directory") {
        config.data_directory = directory.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
    if let Some(limit) = matches.get_one::<usize>("frame_limit") {
        config.frame_limit = Some(*limit);
    }
    if let Some(interval) = matches.get_one::<u64>("send_interval") {
        config.send_interval = Duration::from_millis(*interval);
    }
    config.live |= matches.get_flag("live");
    config.skip_images |= matches.get_flag("skip_images");

    let directory = &config.data_directory;
    if !directory.as_os_str().is_empty() && directory.is_relative() && !directory.is_dir() {
        let root = matches
            .get_one::<PathBuf>("data_root")
            .map(PathBuf::as_path)
            .unwrap_or(Path::new(DEFAULT_DATA_ROOT));
        config = config.resolve_data_directory(root);
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = build_config(&cli().get_matches())?;
    tracing::info!(
        directory = %config.data_directory.display(),
        port = config.port,
        live = config.live,
        "Starting xviz-serve"
    );

    XvizReplay::serve(config).await.context("server failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ArgMatches {
        cli().try_get_matches_from(std::iter::once("xviz-serve").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn flags_override_defaults() {
        let config = build_config(&parse(&[
            "-d",
            "/tmp/frames",
            "-p",
            "9001",
            "--frame_limit",
            "20",
            "--live",
            "--interval",
            "100",
        ]))
        .unwrap();

        assert_eq!(config.data_directory, PathBuf::from("/tmp/frames"));
        assert_eq!(config.port, 9001);
        assert_eq!(config.frame_limit, Some(20));
        assert!(config.live);
        assert!(!config.skip_images);
        assert_eq!(config.send_interval, Duration::from_millis(100));
    }

    #[test]
    fn relative_directory_resolves_against_data_root() {
        let config = build_config(&parse(&["-d", "no-such-scenario", "--data_root", "/srv/xviz"]))
            .unwrap();
        assert_eq!(config.data_directory, PathBuf::from("/srv/xviz/no-such-scenario"));
    }

    #[test]
    fn missing_directory_is_rejected() {
        assert!(build_config(&parse(&[])).is_err());
    }
}
