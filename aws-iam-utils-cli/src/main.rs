//! Command-line front end for aws-iam-utils.
//!
//! Policies are read from JSON files (`-` reads standard input) and results are written
//! to standard output as pretty-printed JSON. Checks print `true` or `false` and exit
//! with status 1 when the answer is `false`; errors exit with status 2.

use std::path::PathBuf;
use std::process::ExitCode;

use aws_iam_utils::AccessLevel;
use clap::{Args, Parser, Subcommand};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "aws-iam-utils", version, about = "Analyse, compare, simplify and generate AWS IAM policies")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// JSON file with action overrides replacing the built-in table
    #[arg(long, global = true, env = "AWS_IAM_UTILS_OVERRIDES")]
    overrides: Option<PathBuf>,

    /// Directory of Service Reference JSON documents layered over the built-in data
    #[arg(long, global = true, env = "AWS_IAM_UTILS_SERVICE_REFERENCE_DIR")]
    service_reference_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether two policies grant exactly the same permissions
    Equal {
        first: PathBuf,
        second: PathBuf,
    },

    /// Check a policy against access levels or ARN types
    Check(CheckArgs),

    /// Concatenate the statements of several policies
    Combine {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Merge statements sharing effect, resource, condition and principal
    Collapse {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Remove duplicate actions, resources and principals
    Dedupe { file: PathBuf },

    /// Replace wildcard actions with the literal actions they match
    Expand { file: PathBuf },

    /// Replace literal actions with equivalent prefix wildcards
    Minimize { file: PathBuf },

    /// Collapse single-element lists, optionally introducing verb wildcards
    Simplify {
        file: PathBuf,

        /// Replace groups of actions with wildcards matching exactly those actions
        #[arg(long)]
        introduce_wildcards: bool,
    },

    /// Generate a policy for one or more services
    Generate(GenerateArgs),

    /// Show the metadata of an action, e.g. `s3:GetObject`
    Lookup { action: String },
}

#[derive(Args, Debug)]
struct CheckArgs {
    file: PathBuf,

    /// Allowed access levels (read, list, write, tagging, permissions-management)
    #[arg(long = "level", value_delimiter = ',', conflicts_with_all = ["read_only", "list_only", "read_write"])]
    levels: Vec<AccessLevel>,

    /// Only Read and List actions
    #[arg(long, conflicts_with_all = ["list_only", "read_write"])]
    read_only: bool,

    /// Only List actions
    #[arg(long, conflicts_with = "read_write")]
    list_only: bool,

    /// Only Read, List and Write actions
    #[arg(long)]
    read_write: bool,

    /// Service whose ARN types are checked
    #[arg(long, requires = "arn_types")]
    service: Option<String>,

    /// Allowed ARN types (`*` for wildcard-resource-only actions)
    #[arg(long = "arn-type", value_delimiter = ',', requires = "service")]
    arn_types: Vec<String>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Service prefix, e.g. `s3`; repeatable with --full
    #[arg(long = "service", required = true)]
    services: Vec<String>,

    /// Access levels to grant
    #[arg(long = "level", value_delimiter = ',', default_values_t = [AccessLevel::List, AccessLevel::Read])]
    levels: Vec<AccessLevel>,

    /// Restrict to actions applying to this ARN type (`*` for wildcard-resource-only)
    #[arg(long)]
    arn_type: Option<String>,

    /// With --arn-type, also grant actions that only accept a wildcard resource
    #[arg(long, requires = "arn_type")]
    include_service_wide_actions: bool,

    /// Emit literal actions instead of verb wildcards
    #[arg(long)]
    no_wildcard_verbs: bool,

    /// Grant `service:*` for every service
    #[arg(long, conflicts_with_all = ["arn_type", "no_wildcard_verbs"])]
    full: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match commands::run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}
