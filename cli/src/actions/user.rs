use log::info;
use once_cell::sync::Lazy;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use regex::Regex;
use serde_json::{Map, Value};
use who_romania_client::{
    Capacity, Catalog, Context, Error, NewMember, NewUser, Result, User, UserEmail, Username,
};

use crate::actions::{best_effort, Extension};

const PASSWORD_LENGTH: usize = 43;
const MAX_USERNAME_ATTEMPTS: usize = 100;

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w]").expect("Username regex is well-formed"));

/// The account the request is acting as.
pub fn user_show_me(context: &Context) -> Result<User> {
    context
        .user
        .clone()
        .ok_or_else(|| Error::not_authorized("You must be logged in to see your own account"))
}

/// Explicit ids on new accounts must be strings nobody holds as an id or name.
pub fn check_id_is_unique(catalog: &dyn Catalog, data: &Map<String, Value>) -> Result<()> {
    let new_user_id = match data.get("id") {
        None => return Ok(()),
        Some(Value::String(id)) => id,
        Some(_) => return Err(Error::invalid_field("id", "User IDs must be strings")),
    };

    match catalog.user_show(&Context::site(), new_user_id) {
        Ok(_) => Err(Error::invalid("That user ID is not available.")),
        Err(error) if error.is_not_found() => Ok(()),
        Err(error) => Err(error),
    }
}

pub fn generate_password() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LENGTH)
        .map(char::from)
        .collect()
}

fn is_username_available(catalog: &dyn Catalog, name: &str) -> Result<bool> {
    match catalog.user_show(&Context::site(), name) {
        Ok(_) => Ok(false),
        Err(error) if error.is_not_found() => Ok(true),
        Err(error) => Err(error),
    }
}

/// A login name derived from the local part of `email`.
///
/// This exposes part of the address as a public user name.
pub fn username_from_email(
    catalog: &dyn Catalog,
    email: &UserEmail,
    rng: &mut impl Rng,
) -> Result<Username> {
    let cleaned = NON_WORD
        .replace_all(email.local_part(), "-")
        .to_lowercase();

    for _ in 0..MAX_USERNAME_ATTEMPTS {
        let candidate = format!("{}-{}", cleaned, rng.gen_range(0..10_000));
        if is_username_available(catalog, &candidate)? {
            return Ok(Username(candidate));
        }
    }
    Ok(Username(cleaned))
}

/// Chained `user_create`: fills in a password and a login name when the caller
/// left them out, then joins the new account to the default organization.
pub fn user_create(
    extension: &Extension,
    context: &Context,
    mut data: Map<String, Value>,
    rng: &mut impl Rng,
) -> Result<User> {
    check_id_is_unique(extension.catalog.as_ref(), &data)?;

    if !matches!(data.get("password"), Some(Value::String(password)) if !password.is_empty()) {
        data.insert("password".to_owned(), Value::String(generate_password()));
    }

    if !matches!(data.get("name"), Some(Value::String(name)) if !name.is_empty()) {
        let email = match data.get("email") {
            Some(Value::String(email)) if !email.is_empty() => UserEmail(email.clone()),
            _ => {
                return Err(Error::invalid(
                    "You must specify either a name or an email",
                ))
            }
        };
        let name = username_from_email(extension.catalog.as_ref(), &email, rng)?;
        data.insert("name".to_owned(), Value::String(name.0));
    }

    let new_user: NewUser = serde_json::from_value(Value::Object(data))
        .map_err(|error| Error::invalid(format!("Invalid user fields: {error}")))?;
    let user = extension.catalog.user_create(context, &new_user)?;
    info!("Created user `{}` [id: {}]", user.name, user.id.0);

    let organization = &extension.settings.default_organization;
    best_effort(
        format!("add user {} to organization {}", user.name, organization),
        || {
            extension.catalog.organization_member_create(
                &Context::site(),
                &NewMember {
                    id: organization,
                    username: &user.name.0,
                    role: Capacity::Editor,
                },
            )
        },
    );

    Ok(user)
}

/// Chained `user_list`: a query naming an existing account is rewritten to
/// that account's login name.
pub fn user_list(
    extension: &Extension,
    context: &Context,
    data: Map<String, Value>,
) -> Result<Vec<User>> {
    let mut q = data.get("q").and_then(Value::as_str).map(str::to_owned);

    if let Some(query) = q.as_deref() {
        match extension.catalog.user_show(context, query) {
            Ok(user) => q = Some(user.name.0),
            Err(error) if error.is_not_found() => {}
            Err(error) => return Err(error),
        }
    }

    extension.catalog.user_list(context, q.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{extension, payload, sysadmin, user, FakeCatalog};
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};
    use serde_json::json;
    use zxcvbn::{zxcvbn, Score};

    static GENERATED_NAME: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^jane-doe-[0-9]{1,4}$").unwrap());

    fn rng() -> StdRng {
        StdRng::seed_from_u64(3)
    }

    fn admin() -> Context {
        Context::for_user(sysadmin("admin-id", "admin"))
    }

    #[test]
    fn test_user_show_me() {
        let me = user("u1", "editor");
        assert_eq!(user_show_me(&Context::for_user(me.clone())).unwrap(), me);
        assert!(user_show_me(&Context::anonymous())
            .unwrap_err()
            .is_not_authorized());
    }

    #[test]
    fn test_generated_password() {
        let password = generate_password();
        assert_eq!(password.len(), PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(password, generate_password());
    }

    #[test]
    fn test_user_create_sends_a_strong_password() {
        let (extension, catalog) = extension(FakeCatalog::default());

        let created = user_create(
            &extension,
            &admin(),
            payload(json!({"email": "jane.doe@example.org"})),
            &mut rng(),
        )
        .unwrap();

        let sent = catalog.new_users();
        assert_eq!(sent.len(), 1);
        let password = sent[0].password.as_deref().unwrap();
        let estimate = zxcvbn(password, &[created.name.0.as_str(), "jane.doe@example.org"]);
        assert_eq!(estimate.score(), Score::Four);
    }

    #[test]
    fn test_given_password_is_kept() {
        let (extension, catalog) = extension(FakeCatalog::default());

        user_create(
            &extension,
            &admin(),
            payload(json!({"name": "jane", "email": "jane@example.org", "password": "chosen"})),
            &mut rng(),
        )
        .unwrap();

        assert_eq!(catalog.new_users()[0].password.as_deref(), Some("chosen"));
    }

    #[test]
    fn test_username_from_email() {
        let catalog = FakeCatalog::default();
        let name = username_from_email(
            &catalog,
            &UserEmail("Jane.Doe@example.org".to_owned()),
            &mut rng(),
        )
        .unwrap();
        assert!(GENERATED_NAME.is_match(&name.0), "unexpected name {}", name.0);
    }

    #[test]
    fn test_check_id_is_unique() {
        let catalog = FakeCatalog::default().with_users(vec![user("u1", "taken")]);

        assert!(check_id_is_unique(&catalog, &payload(json!({"name": "x"}))).is_ok());
        assert!(check_id_is_unique(&catalog, &payload(json!({"id": "fresh"}))).is_ok());

        match check_id_is_unique(&catalog, &payload(json!({"id": 12}))) {
            Err(Error::Validation(errors)) => assert_eq!(
                errors.messages_for("id").to_vec(),
                vec!["User IDs must be strings"]
            ),
            other => panic!("unexpected result {other:?}"),
        }
        for taken in ["u1", "taken"] {
            match check_id_is_unique(&catalog, &payload(json!({ "id": taken }))) {
                Err(Error::Validation(errors)) => assert_eq!(
                    errors.message.as_deref(),
                    Some("That user ID is not available.")
                ),
                other => panic!("unexpected result {other:?}"),
            }
        }
    }

    #[test]
    fn test_user_create_with_email_only() {
        let (extension, catalog) = extension(FakeCatalog::default());

        let created = user_create(
            &extension,
            &admin(),
            payload(json!({"email": "jane.doe@example.org"})),
            &mut rng(),
        )
        .unwrap();

        assert!(GENERATED_NAME.is_match(&created.name.0));
        assert_eq!(
            catalog.memberships(),
            vec![(
                "who_romania".to_owned(),
                created.id.0.clone(),
                Capacity::Editor
            )]
        );
        assert_eq!(
            catalog.contexts_for("organization_member_create"),
            vec![Context::site()]
        );
    }

    #[test]
    fn test_user_create_keeps_given_name() {
        let (extension, catalog) = extension(FakeCatalog::default());

        let created = user_create(
            &extension,
            &admin(),
            payload(json!({"name": "test_user", "email": "t@example.org", "password": "pw"})),
            &mut rng(),
        )
        .unwrap();

        assert_eq!(created.name.0, "test_user");
        assert_eq!(catalog.calls_to("user_show"), 0);
    }

    #[test]
    fn test_user_create_needs_name_or_email() {
        let (extension, catalog) = extension(FakeCatalog::default());

        match user_create(&extension, &admin(), payload(json!({})), &mut rng()) {
            Err(Error::Validation(errors)) => assert_eq!(
                errors.message.as_deref(),
                Some("You must specify either a name or an email")
            ),
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(catalog.calls_to("user_create"), 0);
    }

    #[test]
    fn test_user_create_survives_membership_failure() {
        let (extension, _) =
            extension(FakeCatalog::default().failing("organization_member_create"));

        let created = user_create(
            &extension,
            &admin(),
            payload(json!({"email": "test@test.org"})),
            &mut rng(),
        )
        .unwrap();

        assert_eq!(created.email, Some(UserEmail("test@test.org".to_owned())));
    }

    #[test]
    fn test_user_create_rejects_taken_id() {
        let (extension, catalog) =
            extension(FakeCatalog::default().with_users(vec![user("u1", "someone")]));

        assert!(user_create(
            &extension,
            &admin(),
            payload(json!({"id": "u1", "name": "fresh", "email": "f@example.org"})),
            &mut rng(),
        )
        .is_err());
        assert_eq!(catalog.calls_to("user_create"), 0);
    }

    #[test]
    fn test_user_list_rewrites_id_query() {
        let (extension, _) = extension(FakeCatalog::default().with_users(vec![
            user("7f88caf3", "fjelltopp_editor"),
            user("u2", "other"),
        ]));

        let users = user_list(&extension, &admin(), payload(json!({"q": "7f88caf3"}))).unwrap();
        assert_eq!(
            users.iter().map(|user| user.name.0.as_str()).collect::<Vec<_>>(),
            vec!["fjelltopp_editor"]
        );

        let users = user_list(&extension, &admin(), payload(json!({"q": "oth"}))).unwrap();
        assert_eq!(users.len(), 1);

        let users = user_list(&extension, &admin(), payload(json!({}))).unwrap();
        assert_eq!(users.len(), 2);
    }
}
