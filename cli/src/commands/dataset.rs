//! `wr duplicate` and `wr replace-tags`.

use anyhow::{anyhow, Context, Error, Result};
use log::info;
use serde_json::{Map, Value};
use std::str::FromStr;
use structopt::StructOpt;

use super::{JsonObject, Session};
use crate::{actions::dataset, printer::Printer};

#[derive(Debug, StructOpt)]
pub struct DuplicateArgs {
    #[structopt(name = "dataset")]
    /// Name or id of the dataset to copy
    dataset: String,

    #[structopt(long = "title")]
    /// Title of the copy. The new name is derived from it.
    title: Option<String>,

    #[structopt(long = "fields")]
    /// Other fields to set on the copy, as a JSON object
    fields: Option<JsonObject>,
}

/// One `old=new` tag rename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRename {
    from: String,
    to: String,
}

impl FromStr for TagRename {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        match string.split_once('=') {
            Some((from, to)) if !from.is_empty() && !to.is_empty() => Ok(TagRename {
                from: from.to_owned(),
                to: to.to_owned(),
            }),
            _ => Err(anyhow!("expected `old=new`, got '{}'", string)),
        }
    }
}

#[derive(Debug, StructOpt)]
pub struct ReplaceTagsArgs {
    #[structopt(name = "rename", required = true)]
    /// Tag renames, each written `old=new`
    renames: Vec<TagRename>,

    #[structopt(short = "q", long = "query")]
    /// Only touch datasets matching this search query
    query: Option<String>,

    #[structopt(long = "fq")]
    /// Only touch datasets matching this filter query
    filter: Option<String>,

    #[structopt(long = "include-private")]
    /// Also rename tags on private datasets
    include_private: bool,
}

pub fn duplicate(session: &Session, args: &DuplicateArgs, printer: &Printer) -> Result<()> {
    let DuplicateArgs {
        dataset,
        title,
        fields,
    } = args;

    let mut data = fields.clone().unwrap_or_default().0;
    data.insert("id".to_owned(), Value::String(dataset.clone()));
    if let Some(title) = title {
        data.insert("title".to_owned(), Value::String(title.clone()));
    }

    let context = session.context()?;
    let copy = dataset::dataset_duplicate(
        &session.extension,
        &context,
        data,
        &mut rand::thread_rng(),
    )
    .with_context(|| format!("Operation to duplicate dataset `{dataset}` has failed."))?;
    info!(
        "Duplicated `{}` as `{}`",
        dataset,
        copy.name.as_ref().map(|name| name.0.as_str()).unwrap_or_default()
    );
    printer.print_resources(&[copy])
}

fn replace_tags_payload(args: &ReplaceTagsArgs) -> Map<String, Value> {
    let tags = args
        .renames
        .iter()
        .map(|rename| (rename.from.clone(), Value::String(rename.to.clone())))
        .collect::<Map<_, _>>();

    let mut data = Map::new();
    data.insert("tags".to_owned(), Value::Object(tags));
    if let Some(query) = &args.query {
        data.insert("q".to_owned(), Value::String(query.clone()));
    }
    if let Some(filter) = &args.filter {
        data.insert("fq".to_owned(), Value::String(filter.clone()));
    }
    if args.include_private {
        data.insert("include_private".to_owned(), Value::Bool(true));
    }
    data
}

pub fn replace_tags(session: &Session, args: &ReplaceTagsArgs, printer: &Printer) -> Result<()> {
    let context = session.context()?;
    let summary =
        dataset::dataset_tag_replace(&session.extension, &context, replace_tags_payload(args))
            .context("Operation to replace tags has failed.")?;
    info!("Modified {} datasets", summary.datasets_modified);
    printer.print_value(&summary)
}
