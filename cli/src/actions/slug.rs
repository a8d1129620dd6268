//! Dataset names generated from titles.

use deunicode::deunicode;
use log::debug;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use who_romania_client::{Catalog, Context, Dataset, DatasetName, Error, Result};

const MAX_NAME_ATTEMPTS: usize = 10;
const SUFFIX_LENGTH: usize = 3;

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("Slug regex is well-formed"));
static QUOTES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"['"‘’“”`]"#).expect("Quote regex is well-formed"));

/// Lowercase ASCII slug of `text`, words joined by single hyphens. Letters
/// outside ASCII are transliterated first.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode(text);
    let ascii = QUOTES.replace_all(&ascii, "").to_lowercase();
    NON_ALPHANUMERIC
        .replace_all(&ascii, "-")
        .trim_matches('-')
        .to_owned()
}

/// Whether `name` can be given to a new dataset: nothing holds it, or only a
/// deleted dataset does.
pub fn is_name_available(catalog: &dyn Catalog, name: &str) -> Result<bool> {
    match catalog.package_show(&Context::site(), name) {
        Ok(dataset) => Ok(dataset.is_deleted()),
        Err(error) if error.is_not_found() => Ok(true),
        Err(error) => Err(error),
    }
}

fn random_suffix(rng: &mut impl Rng) -> String {
    (0..SUFFIX_LENGTH)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

/// Pick the name a dataset is saved under.
///
/// An existing dataset keeps its name and an explicit name is used as given.
/// Otherwise the title is slugified and, while the slug is taken, a random
/// three letter suffix is tried instead, up to ten attempts in all.
pub fn generate_name(
    catalog: &dyn Catalog,
    title: Option<&str>,
    name: Option<&str>,
    editing: Option<&Dataset>,
    rng: &mut impl Rng,
) -> Result<DatasetName> {
    if let Some(existing) = editing {
        if let Some(existing_name) = &existing.name {
            return Ok(existing_name.clone());
        }
    }

    if let Some(name) = name.filter(|name| !name.is_empty()) {
        return Ok(DatasetName(name.to_owned()));
    }

    let title = match title.filter(|title| !title.is_empty()) {
        Some(title) => title,
        None => return Err(Error::invalid_field("title", "Missing value")),
    };

    let title_slug = slugify(title);
    if title_slug.is_empty() {
        return Err(Error::invalid_field(
            "title",
            "Title must contain at least one letter or digit.",
        ));
    }
    let mut candidate = title_slug.clone();
    for _ in 0..MAX_NAME_ATTEMPTS {
        if is_name_available(catalog, &candidate)? {
            debug!("Generated dataset name `{}` from title `{}`", candidate, title);
            return Ok(DatasetName(candidate));
        }
        candidate = format!("{}-{}", title_slug, random_suffix(rng));
    }

    Err(Error::invalid_field(
        "name",
        "Could not autogenerate a unique name.",
    ))
}
