use anyhow::{Context, Result};
use log::debug;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};
use who_romania_client::FunctionsConfig;

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct WhoRomaniaConfig {
    current_context: Option<String>,
    contexts: Vec<ContextConfig>,
    #[serde(default)]
    pub extension: Settings,
}

impl WhoRomaniaConfig {
    pub fn get_all_contexts(&self) -> &Vec<ContextConfig> {
        &self.contexts
    }

    pub fn get_context(&self, name: &str) -> Option<&ContextConfig> {
        self.contexts.iter().find(|context| context.name == name)
    }

    pub fn set_context(&mut self, context: ContextConfig) -> bool {
        if let Some(index) = self.context_position(&context.name) {
            self.contexts[index] = context;
            true
        } else {
            self.contexts.push(context);
            false
        }
    }

    pub fn delete_context(&mut self, name: &str) -> bool {
        if let Some(index) = self.context_position(name) {
            self.contexts.remove(index);
            if self
                .current_context
                .as_ref()
                .map_or(false, |current_context| current_context == name)
            {
                self.current_context = None
            }
            true
        } else {
            false
        }
    }

    pub fn get_current_context(&self) -> Option<&ContextConfig> {
        self.current_context
            .as_ref()
            .and_then(|current_context| self.get_context(current_context))
    }

    pub fn set_current_context(&mut self, name: &str) -> bool {
        if self.get_context(name).is_some() {
            self.current_context = Some(name.to_owned());
            true
        } else {
            false
        }
    }

    pub fn num_contexts(&self) -> usize {
        self.contexts.len()
    }

    fn context_position(&self, name: &str) -> Option<usize> {
        self.contexts
            .iter()
            .position(|context| context.name == name)
    }
}

/// A catalog instance the service can talk to, with the service account's token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContextConfig {
    pub name: String,
    pub endpoint: Url,
    pub token: Option<String>,
    pub accept_invalid_certificates: bool,
    pub proxy: Option<Url>,
}

/// Settings for the extension's own behaviour, shared by every context.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Catalog URL handed to remote functions so they can call back.
    pub lambda_ckan_url: Option<String>,
    pub lambda_family_medicine_function: String,
    pub lambda_family_medicine_template: String,
    /// Space separated user names allowed to invoke remote functions.
    pub lambda_invoke_users: String,
    /// Organization every new account joins as an editor.
    pub default_organization: String,
    pub login_view: String,
    /// Redirects issued for this path clear the browser's site data.
    pub logout_path: String,
    pub functions: FunctionsSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            lambda_ckan_url: None,
            lambda_family_medicine_function: String::new(),
            lambda_family_medicine_template: String::new(),
            lambda_invoke_users: " ".to_owned(),
            default_organization: "who_romania".to_owned(),
            login_view: "user.login".to_owned(),
            logout_path: "/user/_logout".to_owned(),
            functions: FunctionsSettings::default(),
        }
    }
}

impl Settings {
    pub fn lambda_invoke_users(&self) -> impl Iterator<Item = &str> {
        self.lambda_invoke_users
            .split(' ')
            .filter(|name| !name.is_empty())
    }
}

/// Where remote functions run. Anything left unset comes from the
/// provider's usual environment variables and shared configuration files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FunctionsSettings {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub endpoint_url: Option<Url>,
}

impl FunctionsSettings {
    pub fn client_config(&self) -> FunctionsConfig {
        FunctionsConfig {
            region: self.region.clone(),
            profile: self.profile.clone(),
            endpoint_url: self.endpoint_url.clone(),
            credentials: None,
        }
    }
}

pub fn read_who_romania_config(path: impl AsRef<Path>) -> Result<WhoRomaniaConfig> {
    debug!("Reading config file at `{}`", path.as_ref().display());
    if path.as_ref().exists() {
        let file = File::open(&path)
            .with_context(|| format!("Could not open config file `{}`", path.as_ref().display()))?;
        let config_reader = BufReader::new(file);
        serde_json::from_reader(config_reader)
            .with_context(|| format!("Could not parse config file `{}`", path.as_ref().display()))
    } else {
        Ok(Default::default())
    }
}

pub fn write_who_romania_config(path: impl AsRef<Path>, config: &WhoRomaniaConfig) -> Result<()> {
    debug!("Writing config file at `{}`", path.as_ref().display());
    let file = File::create(&path)
        .with_context(|| format!("Could not create config file `{}`", path.as_ref().display()))?;
    let config_writer = BufWriter::new(file);
    serde_json::to_writer_pretty(config_writer, &config).with_context(|| {
        format!(
            "Could not serialise configuration to `{}`",
            path.as_ref().display()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_extension_defaults() {
        let config: WhoRomaniaConfig =
            serde_json::from_value(json!({"current_context": null, "contexts": []})).unwrap();

        assert_eq!(config.extension, Settings::default());
        assert_eq!(config.extension.default_organization, "who_romania");
        assert_eq!(config.extension.lambda_invoke_users().count(), 0);
    }

    #[test]
    fn test_partial_extension_block() {
        let config: WhoRomaniaConfig = serde_json::from_value(json!({
            "current_context": "prod",
            "contexts": [{
                "name": "prod",
                "endpoint": "https://data.who-romania.org",
                "token": null,
                "accept_invalid_certificates": false,
                "proxy": null,
            }],
            "extension": {"lambda_invoke_users": "admin  analyst"},
        }))
        .unwrap();

        assert_eq!(
            config.extension.lambda_invoke_users().collect::<Vec<_>>(),
            vec!["admin", "analyst"]
        );
        assert_eq!(config.extension.logout_path, "/user/_logout");
        assert_eq!(config.get_current_context().unwrap().name, "prod");
        assert_eq!(config.extension.functions, FunctionsSettings::default());
    }

    #[test]
    fn test_functions_block() {
        let settings: Settings = serde_json::from_value(json!({
            "functions": {"region": "eu-central-1", "endpoint_url": "http://localhost:4566"},
        }))
        .unwrap();

        let client_config = settings.functions.client_config();
        assert_eq!(client_config.region.as_deref(), Some("eu-central-1"));
        assert_eq!(client_config.profile, None);
        assert_eq!(
            client_config.endpoint_url.map(String::from).as_deref(),
            Some("http://localhost:4566/")
        );
        assert!(client_config.credentials.is_none());
    }

    #[test]
    fn test_delete_current_context() {
        let mut config = WhoRomaniaConfig::default();
        config.set_context(ContextConfig {
            name: "local".to_owned(),
            endpoint: Url::parse("http://localhost:5000").unwrap(),
            token: None,
            accept_invalid_certificates: false,
            proxy: None,
        });
        assert!(config.set_current_context("local"));
        assert!(config.delete_context("local"));
        assert!(config.get_current_context().is_none());
        assert!(!config.set_current_context("local"));
    }
}
