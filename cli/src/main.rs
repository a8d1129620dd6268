#![deny(clippy::all)]
mod actions;
mod args;
mod authn;
mod authz;
mod commands;
mod config;
mod helpers;
mod printer;
mod server;
#[cfg(test)]
mod testing;
mod utils;

use anyhow::{anyhow, Context, Result};
use log::{debug, error, warn};
use std::{fs, io, path::PathBuf, process, sync::Arc, time::Duration};
use structopt::{clap::Shell as ClapShell, StructOpt};
use who_romania_client::{
    retry::{RetryConfig, RetryStrategy},
    Client, Config as ClientConfig, FunctionsClient, Token, DEFAULT_ENDPOINT,
};

use crate::{
    actions::Extension,
    args::{Args, Command, Shell},
    commands::{
        config as config_command, create, dataset, get, lambda, serve, Session,
    },
    config::WhoRomaniaConfig,
    printer::Printer,
    utils::io::{init_env_logger, read_token_from_stdin},
};

fn run(args: Args) -> Result<()> {
    let config_path = find_configuration(&args)?;
    let cli_config = config::read_who_romania_config(&config_path)?;
    let printer = Printer::new(args.output);

    match &args.command {
        Command::Config { config_args } => {
            config_command::run(config_args, cli_config, config_path).map(|_| ())
        }
        Command::Completion { shell } => {
            let mut app = Args::clap();
            let clap_shell = match shell {
                Shell::Zsh => ClapShell::Zsh,
                Shell::Bash => ClapShell::Bash,
            };
            app.gen_completions_to("wr", clap_shell, &mut io::stdout());
            Ok(())
        }
        Command::Serve(serve_args) => {
            let (extension, _) = extension_from_args(&args, &cli_config)?;
            serve::run(serve_args, extension)
        }
        Command::Create { create_args } => {
            create::run(create_args, &session_from_args(&args, &cli_config)?, &printer)
        }
        Command::Duplicate(duplicate_args) => dataset::duplicate(
            &session_from_args(&args, &cli_config)?,
            duplicate_args,
            &printer,
        ),
        Command::Get { get_args } => {
            get::run(get_args, &session_from_args(&args, &cli_config)?, &printer)
        }
        Command::Lambda { lambda_args } => {
            lambda::run(lambda_args, &session_from_args(&args, &cli_config)?, &printer)
        }
        Command::ReplaceTags(replace_tags_args) => dataset::replace_tags(
            &session_from_args(&args, &cli_config)?,
            replace_tags_args,
            &printer,
        ),
    }
}

fn session_from_args(args: &Args, config: &WhoRomaniaConfig) -> Result<Session> {
    let (extension, token) = extension_from_args(args, config)?;
    Ok(Session::new(
        Arc::new(extension),
        token.0,
        args.as_user.clone(),
    ))
}

/// Build the extension against the selected context's catalog, returning it
/// with the service token it was built with.
fn extension_from_args(args: &Args, config: &WhoRomaniaConfig) -> Result<(Extension, Token)> {
    let current_context = if let Some(context_name) = args.context.as_ref() {
        let context = config.get_context(context_name);
        if context.is_none() {
            return Err(anyhow!("Unknown context `{}`.", context_name));
        };
        context
    } else {
        config.get_current_context()
    };

    let endpoint = args
        .endpoint
        .clone()
        .or_else(|| current_context.map(|context| context.endpoint.clone()))
        .unwrap_or_else(|| DEFAULT_ENDPOINT.clone());

    let args_or_config_token = args
        .token
        .clone()
        .or_else(|| current_context.and_then(|context| context.token.clone()));

    let token = Token(if let Some(token) = args_or_config_token {
        token
    } else {
        read_token_from_stdin()?.unwrap_or_default()
    });

    let accept_invalid_certificates = args
        .accept_invalid_certificates
        .or_else(|| current_context.map(|context| context.accept_invalid_certificates))
        .unwrap_or(false);

    if accept_invalid_certificates {
        warn!(concat!(
            "TLS certificate verification is disabled. ",
            "Do NOT use this over an insecure network."
        ));
    }

    let proxy = args
        .proxy
        .clone()
        .or_else(|| current_context.and_then(|context| context.proxy.clone()));

    let retry_config = RetryConfig {
        strategy: RetryStrategy::Automatic,
        max_retry_count: 5,
        base_wait: Duration::from_secs(2),
        backoff_factor: 2.0,
    };

    let catalog = Client::new(ClientConfig {
        endpoint,
        token: token.clone(),
        accept_invalid_certificates,
        proxy,
        retry_config: Some(retry_config),
    })
    .context("Failed to initialise the catalog client")?;
    debug!("Using the catalog at `{}`", catalog.base_url());

    let settings = config.extension.clone();
    let functions = FunctionsClient::new(settings.functions.client_config());

    Ok((
        Extension::new(Arc::new(catalog), Arc::new(functions), settings),
        token,
    ))
}

fn find_configuration(args: &Args) -> Result<PathBuf> {
    let config_path = if let Some(config_path) = args.config.clone() {
        if !config_path.exists() {
            warn!(
                "Configuration file `{}` doesn't exist.",
                config_path.display()
            );
        }
        config_path
    } else {
        let mut config_path =
            dirs::config_dir().context("Could not get path to the user's config directory")?;
        config_path.push("who-romania");
        fs::create_dir_all(&config_path).with_context(|| {
            format!(
                "Could not create config directory {}",
                config_path.display()
            )
        })?;
        config_path.push("contexts.json");
        config_path
    };
    Ok(config_path)
}

fn main() {
    let args = Args::from_args();
    init_env_logger(args.verbose, matches!(args.command, Command::Serve(_)));

    if let Err(error) = run(args) {
        error!("An error occurred:");
        for cause in error.chain() {
            error!(" |- {cause}");
        }

        #[cfg(feature = "backtrace")]
        {
            error!("{}", error.backtrace());
        }

        process::exit(1);
    }
}
