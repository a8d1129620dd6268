use anyhow::{Context, Result};
use log::info;
use serde_json::{Map, Value};
use structopt::StructOpt;

use super::Session;
use crate::{actions::user, printer::Printer};

#[derive(Debug, StructOpt)]
pub enum CreateArgs {
    #[structopt(name = "user")]
    /// Create a new user account and add it to the default organization
    User(CreateUserArgs),
}

#[derive(Debug, StructOpt)]
pub struct CreateUserArgs {
    #[structopt(long = "name")]
    /// Login name. Derived from the email address when left out.
    name: Option<String>,

    #[structopt(long = "email")]
    /// Email address of the new user
    email: Option<String>,

    #[structopt(long = "fullname")]
    /// Display name of the new user
    fullname: Option<String>,

    #[structopt(long = "password")]
    /// Password. A random one is generated when left out.
    password: Option<String>,

    #[structopt(long = "id")]
    /// Explicit account id, must not already be in use
    id: Option<String>,
}

pub fn run(args: &CreateArgs, session: &Session, printer: &Printer) -> Result<()> {
    match args {
        CreateArgs::User(args) => create_user(session, args, printer),
    }
}

fn user_payload(args: &CreateUserArgs) -> Map<String, Value> {
    let CreateUserArgs {
        name,
        email,
        fullname,
        password,
        id,
    } = args;

    [
        ("name", name),
        ("email", email),
        ("fullname", fullname),
        ("password", password),
        ("id", id),
    ]
    .into_iter()
    .filter_map(|(field, value)| {
        value
            .as_ref()
            .map(|value| (field.to_owned(), Value::String(value.clone())))
    })
    .collect()
}

fn create_user(session: &Session, args: &CreateUserArgs, printer: &Printer) -> Result<()> {
    let context = session.context()?;
    let user = user::user_create(
        &session.extension,
        &context,
        user_payload(args),
        &mut rand::thread_rng(),
    )
    .context("Operation to create a user has failed")?;
    info!(
        "New user `{}` [id: {}] created successfully",
        user.name.0, user.id.0
    );
    printer.print_resources(&[user])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_user_payload_skips_missing_fields() {
        let args = CreateUserArgs::from_iter(&[
            "user",
            "--email",
            "jane.doe@example.org",
            "--fullname",
            "Jane Doe",
        ]);
        assert_eq!(
            Value::Object(user_payload(&args)),
            json!({"email": "jane.doe@example.org", "fullname": "Jane Doe"})
        );
    }
}
