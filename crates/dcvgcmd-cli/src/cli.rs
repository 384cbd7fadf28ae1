use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "DCV-GCMD CLI - Dual control-volume grand canonical molecular dynamics for steady-state diffusion through slit pores and membranes.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel energy summation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a DCV-GCMD simulation and report the flux through each control region.
    Run(RunArgs),
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to the simulation configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the number of scheduler steps to run.
    #[arg(short = 'n', long, value_name = "INT")]
    pub steps: Option<u64>,

    /// Override the random seed.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the bath temperature.
    #[arg(short = 't', long, value_name = "FLOAT")]
    pub temperature: Option<f64>,

    /// Number of density-profile bins to print per species; 0 disables the profile.
    #[arg(long, value_name = "INT", default_value_t = 0)]
    pub profile_bins: usize,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S simulation.md-burst-length=100
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_subcommand_parses_overrides() {
        let cli = Cli::parse_from([
            "dcvgcmd",
            "-vv",
            "run",
            "-c",
            "sim.toml",
            "-n",
            "500",
            "--seed",
            "7",
            "-S",
            "simulation.md-burst-length=20",
            "-S",
            "region.fraction=0.2",
        ]);
        assert_eq!(cli.verbose, 2);
        let Commands::Run(args) = cli.command;
        assert_eq!(args.config, PathBuf::from("sim.toml"));
        assert_eq!(args.steps, Some(500));
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.temperature, None);
        assert_eq!(args.set_values.len(), 2);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["dcvgcmd", "-q", "-v", "run", "-c", "sim.toml"]);
        assert!(result.is_err());
    }

    #[test]
    fn config_is_required() {
        assert!(Cli::try_parse_from(["dcvgcmd", "run"]).is_err());
    }
}
