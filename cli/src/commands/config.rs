//! `wr config`: catalog contexts and the extension settings they share.

use anyhow::{anyhow, Context, Error, Result};
use colored::Colorize;
use log::{info, warn};
use prettytable::{cell, row, Table};
use reqwest::Url;
use std::{path::Path, str::FromStr};
use structopt::StructOpt;

use crate::{
    config::{self, ContextConfig, Settings, WhoRomaniaConfig},
    printer::new_table,
    utils::read_token_from_stdin,
};

#[derive(Debug, StructOpt)]
pub enum ConfigArgs {
    #[structopt(name = "add")]
    /// Add a catalog context, or change an existing one
    AddContext(AddContextArgs),

    #[structopt(name = "current")]
    /// Print the name of the context in use
    CurrentContext,

    #[structopt(name = "delete")]
    /// Forget one or more contexts
    DeleteContext {
        #[structopt(required = true)]
        names: Vec<String>,
    },

    #[structopt(name = "ls")]
    /// List the configured contexts
    ListContexts {
        #[structopt(long = "tokens")]
        /// Print service tokens instead of hiding them
        tokens: bool,
    },

    #[structopt(name = "use")]
    /// Make a context the one used by default
    UseContext { name: String },

    #[structopt(name = "set")]
    /// Change one of the extension settings shared by every context
    Set {
        /// The setting to change
        key: SettingKey,

        /// Its new value. Leave out to restore the default.
        value: Option<String>,
    },

    #[structopt(name = "settings")]
    /// Display the extension settings
    ShowSettings,
}

#[derive(Debug, StructOpt)]
pub struct AddContextArgs {
    /// Name of the context
    name: String,

    #[structopt(long = "endpoint", short = "e")]
    /// Root URL of the catalog. Required for a new context.
    endpoint: Option<Url>,

    #[structopt(long = "token", short = "t")]
    /// The service account's API token. Prompted for when left out.
    token: Option<String>,

    #[structopt(long = "accept-invalid-certificates", short = "k")]
    /// Accept invalid TLS certificates from the catalog
    accept_invalid_certificates: bool,

    #[structopt(long = "proxy")]
    /// HTTP proxy for every catalog request
    proxy: Option<Url>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    CkanUrl,
    FamilyMedicineFunction,
    FamilyMedicineTemplate,
    InvokeUsers,
    DefaultOrganization,
    LoginView,
    LogoutPath,
    FunctionsRegion,
    FunctionsProfile,
    FunctionsEndpointUrl,
}

const SETTING_KEYS: [(&str, SettingKey); 10] = [
    ("lambda-ckan-url", SettingKey::CkanUrl),
    (
        "lambda-family-medicine-function",
        SettingKey::FamilyMedicineFunction,
    ),
    (
        "lambda-family-medicine-template",
        SettingKey::FamilyMedicineTemplate,
    ),
    ("lambda-invoke-users", SettingKey::InvokeUsers),
    ("default-organization", SettingKey::DefaultOrganization),
    ("login-view", SettingKey::LoginView),
    ("logout-path", SettingKey::LogoutPath),
    ("functions-region", SettingKey::FunctionsRegion),
    ("functions-profile", SettingKey::FunctionsProfile),
    ("functions-endpoint-url", SettingKey::FunctionsEndpointUrl),
];

impl FromStr for SettingKey {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        SETTING_KEYS
            .iter()
            .find(|(name, _)| *name == string)
            .map(|(_, key)| *key)
            .ok_or_else(|| {
                anyhow!(
                    "unknown setting '{}', expected one of: {}",
                    string,
                    SETTING_KEYS
                        .iter()
                        .map(|(name, _)| *name)
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

pub fn run(
    args: &ConfigArgs,
    mut config: WhoRomaniaConfig,
    config_path: impl AsRef<Path>,
) -> Result<WhoRomaniaConfig> {
    let config_path = config_path.as_ref();
    match args {
        ConfigArgs::AddContext(add_args) => {
            let token = match &add_args.token {
                Some(token) => Some(token.clone()),
                None if config.get_context(&add_args.name).is_some() => None,
                None => read_token_from_stdin()?,
            };
            let created = add_context(&mut config, add_args, token)?;
            config::write_who_romania_config(config_path, &config)?;
            if created {
                info!("New context `{}` was created.", add_args.name);
            } else {
                info!("Context `{}` was updated.", add_args.name);
            }
            if config
                .get_context(&add_args.name)
                .map_or(false, |context| context.token.is_some())
            {
                warn!(
                    "Service tokens are stored in cleartext in `{}`.",
                    config_path.display()
                );
            }
        }
        ConfigArgs::CurrentContext => match config.get_current_context() {
            Some(context) => println!("{}", context.name),
            None => info!("There is no default context in use."),
        },
        ConfigArgs::DeleteContext { names } => {
            let unknown = names
                .iter()
                .filter(|name| !config.delete_context(name))
                .cloned()
                .collect::<Vec<_>>();
            config::write_who_romania_config(config_path, &config)?;
            if !unknown.is_empty() {
                return Err(anyhow!("Unknown contexts: {}", unknown.join(", ")));
            }
            info!("Deleted {} contexts.", names.len());
        }
        ConfigArgs::ListContexts { tokens } => {
            if config.num_contexts() == 0 {
                info!("No available contexts.");
            } else {
                contexts_table(&config, *tokens).printstd();
            }
        }
        ConfigArgs::UseContext { name } => {
            if !config.set_current_context(name) {
                return Err(anyhow!("Unknown context `{}`.", name));
            }
            config::write_who_romania_config(config_path, &config)?;
            info!("Switched to context `{}`.", name);
        }
        ConfigArgs::Set { key, value } => {
            set_setting(&mut config.extension, *key, value.as_deref())?;
            config::write_who_romania_config(config_path, &config)?;
            info!("Updated extension settings in `{}`.", config_path.display());
        }
        ConfigArgs::ShowSettings => show_settings(&config.extension),
    }
    Ok(config)
}

/// Create or change the context `args` names, returning whether it is new.
///
/// Anything left out of `args` keeps the existing context's value. The first
/// context added becomes the current one.
fn add_context(
    config: &mut WhoRomaniaConfig,
    args: &AddContextArgs,
    token: Option<String>,
) -> Result<bool> {
    if args.name.is_empty() {
        return Err(anyhow!("Context name cannot be empty."));
    }

    let existing = config.get_context(&args.name).cloned();
    let endpoint = args
        .endpoint
        .clone()
        .or_else(|| existing.as_ref().map(|context| context.endpoint.clone()))
        .ok_or_else(|| anyhow!("A new context needs an `--endpoint`."))?;

    let context = ContextConfig {
        name: args.name.clone(),
        endpoint,
        token: token.or_else(|| existing.as_ref().and_then(|context| context.token.clone())),
        accept_invalid_certificates: args.accept_invalid_certificates,
        proxy: args
            .proxy
            .clone()
            .or_else(|| existing.as_ref().and_then(|context| context.proxy.clone())),
    };

    let created = !config.set_context(context);
    if created && config.num_contexts() == 1 {
        config.set_current_context(&args.name);
    }
    Ok(created)
}

fn contexts_table(config: &WhoRomaniaConfig, show_tokens: bool) -> Table {
    let current = config
        .get_current_context()
        .map(|context| context.name.as_str());
    let mut contexts = config.get_all_contexts().iter().collect::<Vec<_>>();
    contexts.sort_unstable_by(|lhs, rhs| lhs.name.cmp(&rhs.name));

    let mut table = new_table();
    table.set_titles(row![bFg => "", "Context", "Catalog", "Insecure", "Token", "Proxy"]);
    for context in contexts {
        let is_current = current == Some(context.name.as_str());
        let token = match (&context.token, show_tokens) {
            (Some(token), true) => token.clone(),
            (Some(_), false) => "<Hidden>".to_owned(),
            (None, _) => String::new(),
        };
        table.add_row(row![
            if is_current { "*" } else { "" },
            if is_current {
                context.name.bold()
            } else {
                context.name.normal()
            },
            context.endpoint,
            if context.accept_invalid_certificates {
                "Yes"
            } else {
                "No"
            },
            token,
            context.proxy.as_ref().map(Url::as_str).unwrap_or_default()
        ]);
    }
    table
}

fn parse_url(value: &str) -> Result<Url> {
    Url::parse(value).with_context(|| format!("Invalid URL `{value}`"))
}

fn set_setting(settings: &mut Settings, key: SettingKey, value: Option<&str>) -> Result<()> {
    let defaults = Settings::default();
    match key {
        SettingKey::CkanUrl => settings.lambda_ckan_url = value.map(str::to_owned),
        SettingKey::FamilyMedicineFunction => {
            settings.lambda_family_medicine_function =
                value.map_or(defaults.lambda_family_medicine_function, str::to_owned)
        }
        SettingKey::FamilyMedicineTemplate => {
            settings.lambda_family_medicine_template =
                value.map_or(defaults.lambda_family_medicine_template, str::to_owned)
        }
        SettingKey::InvokeUsers => {
            settings.lambda_invoke_users =
                value.map_or(defaults.lambda_invoke_users, str::to_owned)
        }
        SettingKey::DefaultOrganization => {
            settings.default_organization =
                value.map_or(defaults.default_organization, str::to_owned)
        }
        SettingKey::LoginView => {
            settings.login_view = value.map_or(defaults.login_view, str::to_owned)
        }
        SettingKey::LogoutPath => {
            settings.logout_path = value.map_or(defaults.logout_path, str::to_owned)
        }
        SettingKey::FunctionsRegion => settings.functions.region = value.map(str::to_owned),
        SettingKey::FunctionsProfile => settings.functions.profile = value.map(str::to_owned),
        SettingKey::FunctionsEndpointUrl => {
            settings.functions.endpoint_url = value.map(parse_url).transpose()?
        }
    }
    Ok(())
}

fn show_settings(settings: &Settings) {
    let functions = &settings.functions;
    let mut table = new_table();
    table.set_titles(row![bFg => "Setting", "Value"]);
    let values = [
        settings.lambda_ckan_url.clone().unwrap_or_default(),
        settings.lambda_family_medicine_function.clone(),
        settings.lambda_family_medicine_template.clone(),
        format!("{:?}", settings.lambda_invoke_users),
        settings.default_organization.clone(),
        settings.login_view.clone(),
        settings.logout_path.clone(),
        functions.region.clone().unwrap_or_default(),
        functions.profile.clone().unwrap_or_default(),
        functions
            .endpoint_url
            .as_ref()
            .map(Url::to_string)
            .unwrap_or_default(),
    ];
    for ((name, _), value) in SETTING_KEYS.iter().zip(values) {
        table.add_row(row![name, value]);
    }
    table.printstd();
}
