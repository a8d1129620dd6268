use crate::{
    commands::{
        config::ConfigArgs,
        create::CreateArgs,
        dataset::{DuplicateArgs, ReplaceTagsArgs},
        get::GetArgs,
        lambda::LambdaArgs,
        serve::ServeArgs,
    },
    printer::OutputFormat,
};
use anyhow::{anyhow, Error, Result};
use reqwest::Url;
use std::{path::PathBuf, str::FromStr};
use structopt::StructOpt;

/// wr runs the WHO Romania catalog extension: its HTTP service, and its
/// workflows one at a time from the command line.
#[derive(Debug, StructOpt)]
#[structopt(
    global_settings = &[
        structopt::clap::AppSettings::ColoredHelp,
        structopt::clap::AppSettings::InferSubcommands,
    ]
)]
pub struct Args {
    #[structopt(long = "config-file", parse(from_os_str))]
    /// Path to the configuration file. Typically defaults to ~/.config/who-romania on Linux.
    pub config: Option<PathBuf>,

    #[structopt(short = "c", long = "context")]
    /// Specify what context to use. Overrides the current context, if any.
    pub context: Option<String>,

    #[structopt(short = "v", long = "verbose")]
    /// Enable more verbose logging.
    pub verbose: bool,

    #[structopt(long = "endpoint", parse(try_from_str))]
    /// Specify what catalog endpoint to use. Overrides the one from the
    /// current context, if any.
    pub endpoint: Option<Url>,

    #[structopt(short = "k", long = "accept-invalid-certificates", parse(try_from_str))]
    pub accept_invalid_certificates: Option<bool>,

    #[structopt(long = "token")]
    /// Specify what API token to use. Overrides the one from the current
    /// context, if any.
    pub token: Option<String>,

    #[structopt(long = "proxy")]
    /// URL for an HTTP proxy. Overrides the one from the current context, if any.
    pub proxy: Option<Url>,

    #[structopt(long = "as-user")]
    /// Act as this account (name or id). The API token must belong to a sysadmin.
    pub as_user: Option<String>,

    #[structopt(short = "o", long = "output", default_value = "table")]
    /// Output format. One of: json, table
    pub output: OutputFormat,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    #[structopt(name = "completion")]
    /// Output shell completion code for the specified shell (bash or zsh)
    Completion { shell: Shell },

    #[structopt(name = "config")]
    /// Manage catalog contexts and extension settings
    Config {
        #[structopt(subcommand)]
        config_args: ConfigArgs,
    },

    #[structopt(name = "create")]
    /// Create new resources
    Create {
        #[structopt(subcommand)]
        create_args: CreateArgs,
    },

    #[structopt(name = "duplicate")]
    /// Copy a dataset, recording where the copy came from
    Duplicate(DuplicateArgs),

    #[structopt(name = "get")]
    /// Display resources
    Get {
        #[structopt(subcommand)]
        get_args: GetArgs,
    },

    #[structopt(name = "lambda")]
    /// Run remote functions and read their logs
    Lambda {
        #[structopt(subcommand)]
        lambda_args: LambdaArgs,
    },

    #[structopt(name = "replace-tags")]
    /// Rename tags across every matching dataset
    ReplaceTags(ReplaceTagsArgs),

    #[structopt(name = "serve")]
    /// Run the extension's HTTP service
    Serve(ServeArgs),
}

#[derive(Debug)]
pub enum Shell {
    Bash,
    Zsh,
}

impl FromStr for Shell {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        match string {
            "bash" => Ok(Shell::Bash),
            "zsh" => Ok(Shell::Zsh),
            _ => Err(anyhow!("unknown shell: '{}'", string)),
        }
    }
}
