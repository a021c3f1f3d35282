use std::path::PathBuf;
use std::process;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;

use cubemx_bridge::{cubemx, util::signal};

fn cli() -> Command {
    Command::new("cubemx-bridge")
        .about("Bridge between csolution build descriptions and STM32CubeMX")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("cbuild_yml")
                .long("cbuildYml")
                .alias("cbuild-yml")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("cbuild-gen-idx.yml build description to process"),
        )
        .arg(
            Arg::new("launch")
                .long("launch")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .conflicts_with("cbuild_yml")
                .help("Open the GUI on an existing project (.ioc or .mxproject)"),
        )
        .arg(
            Arg::new("read")
                .long("read")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .conflicts_with_all(["cbuild_yml", "launch"])
                .help("Parse a single input file (.ioc or .mxproject) and dump the model"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log discovery and resolution details"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose")
                .help("Only log errors"),
        )
}

// Log at info by default; -v/-q move the level, RUST_LOG overrides
// everything.
fn setup_logging(matches: &ArgMatches) {
    let level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else if matches.get_flag("quiet") {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    };
    let env = env_logger::Env::default()
        .filter_or(env_logger::DEFAULT_FILTER_ENV, level.to_string());
    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .init();
}

fn run(matches: &ArgMatches) -> Result<()> {
    if let Some(input) = matches.get_one::<PathBuf>("read") {
        cubemx::read_input(input)?;
        return Ok(());
    }
    if let Some(input) = matches.get_one::<PathBuf>("launch") {
        cubemx::launch_project(input)?;
        return Ok(());
    }
    let Some(cbuild_yml) = matches.get_one::<PathBuf>("cbuild_yml") else {
        bail!("no input given, expected --cbuildYml, --launch or --read");
    };

    signal::start_watcher();
    let result = cubemx::process(cbuild_yml);
    signal::stop_watcher();
    result.map_err(Into::into)
}

fn main() {
    let matches = cli().get_matches();
    setup_logging(&matches);

    let start = Instant::now();
    let code = match run(&matches) {
        Ok(()) => 0,
        Err(e) => {
            log::error!("Error: {e:#}");
            1
        }
    };
    log::debug!("finished in {:.2?}", start.elapsed());
    process::exit(code);
}
