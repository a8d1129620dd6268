use anyhow::{Context, Result};
use log::info;
use serde_json::{Map, Value};
use structopt::StructOpt;
use who_romania_client::SearchParams;

use super::Session;
use crate::{
    actions::user,
    helpers,
    printer::Printer,
};

#[derive(Debug, StructOpt)]
pub enum GetArgs {
    #[structopt(name = "datasets")]
    /// List datasets, or show the named ones
    Datasets(GetDatasetsArgs),

    #[structopt(name = "groups")]
    /// List the catalog's groups
    Groups,

    #[structopt(name = "me")]
    /// Get the user the command is acting as
    Me,

    #[structopt(name = "users")]
    /// List the available users
    Users(GetUsersArgs),
}

#[derive(Debug, StructOpt)]
pub struct GetDatasetsArgs {
    #[structopt(name = "dataset")]
    /// If specified, only show these datasets (names or ids)
    datasets: Vec<String>,

    #[structopt(short = "q", long = "query")]
    /// Search query used when no dataset is named
    query: Option<String>,

    #[structopt(long = "rows", default_value = "20")]
    /// How many search results to show
    rows: u64,

    #[structopt(long = "featured")]
    /// Show the datasets featured on the home page instead
    featured: bool,
}

#[derive(Debug, StructOpt)]
pub struct GetUsersArgs {
    #[structopt(short = "q", long = "query")]
    /// Only list users matching this query. An exact name or id lists that user.
    query: Option<String>,
}

pub fn run(args: &GetArgs, session: &Session, printer: &Printer) -> Result<()> {
    let context = session.context()?;
    let extension = session.extension.as_ref();
    match args {
        GetArgs::Datasets(GetDatasetsArgs { featured: true, .. }) => {
            let datasets = helpers::featured_datasets(extension, &context)
                .context("Operation to list featured datasets has failed.")?;
            printer.print_resources(&datasets)
        }
        GetArgs::Datasets(GetDatasetsArgs {
            datasets, query, rows, ..
        }) if datasets.is_empty() => {
            let params = SearchParams {
                q: query.clone(),
                ..Default::default()
            }
            .with_rows(*rows);
            let results = extension
                .catalog
                .package_search(&context, &params)
                .context("Operation to list datasets has failed.")?;
            info!("{} datasets match, showing {}", results.count, results.results.len());
            printer.print_resources(&results.results)
        }
        GetArgs::Datasets(GetDatasetsArgs { datasets, .. }) => {
            let datasets = datasets
                .iter()
                .map(|id| {
                    extension
                        .catalog
                        .package_show(&context, id)
                        .with_context(|| format!("Could not get dataset `{id}`"))
                })
                .collect::<Result<Vec<_>>>()?;
            printer.print_resources(&datasets)
        }
        GetArgs::Groups => {
            let groups = helpers::all_groups(extension, &context)
                .context("Operation to list groups has failed.")?;
            printer.print_resources(&groups)
        }
        GetArgs::Me => {
            let me = user::user_show_me(&context)?;
            printer.print_resources(&[me])
        }
        GetArgs::Users(GetUsersArgs { query }) => {
            let mut data = Map::new();
            if let Some(query) = query {
                data.insert("q".to_owned(), Value::String(query.clone()));
            }
            let mut users = user::user_list(extension, &context, data)
                .context("Operation to list users has failed.")?;
            users.sort_unstable_by(|lhs, rhs| lhs.name.0.cmp(&rhs.name.0));
            printer.print_resources(&users)
        }
    }
}
