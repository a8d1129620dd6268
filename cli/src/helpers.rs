//! Helpers the catalog's page templates call, served over HTTP by name.

use chrono::{
    format::{Item, StrftimeItems},
    Datelike, Duration, NaiveDate,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::{collections::BTreeMap, fmt::Write};
use who_romania_client::{
    Context, Dataset, Error, FacetItem, Organization, Result, SearchFacet, SearchParams,
};

use crate::actions::{dataset::DATASET_FACETS, required_str, Extension};

const FEATURED_COUNT: usize = 3;
const FRIDAY: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetEntry {
    pub name: String,
    pub display_name: String,
    pub count: u64,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekOption {
    pub text: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FacetItemsRequest {
    facet: String,
    search_facets: BTreeMap<String, SearchFacet>,
    /// The page's query string, as name/value pairs.
    params: Vec<(String, String)>,
    limit: Option<usize>,
    exclude_active: bool,
}

/// Items of one search facet, ordered for display.
///
/// Items named in the page's query string are marked active, or dropped with
/// `exclude_active`. The `year` facet is ordered newest first, the others by
/// count and then by name. A limit of zero means no limit.
pub fn facet_items(
    facet: &str,
    search_facets: &BTreeMap<String, SearchFacet>,
    params: &[(String, String)],
    limit: Option<usize>,
    exclude_active: bool,
) -> Vec<FacetEntry> {
    let items = match search_facets.get(facet) {
        Some(search_facet) => &search_facet.items,
        None => return Vec::new(),
    };

    let mut entries: Vec<FacetEntry> = items
        .iter()
        .filter(|item| !item.name.trim().is_empty())
        .filter_map(|item| {
            let active = params
                .iter()
                .any(|(name, value)| name == facet && value == &item.name);
            if active && exclude_active {
                None
            } else {
                Some(entry(item, active))
            }
        })
        .collect();

    if facet == "year" {
        entries.sort_by(|left, right| {
            right
                .display_name
                .to_lowercase()
                .cmp(&left.display_name.to_lowercase())
        });
    } else {
        entries.sort_by(|left, right| {
            right.count.cmp(&left.count).then_with(|| {
                left.display_name
                    .to_lowercase()
                    .cmp(&right.display_name.to_lowercase())
            })
        });
    }

    if let Some(limit) = limit.filter(|limit| *limit > 0) {
        entries.truncate(limit);
    }
    entries
}

fn entry(item: &FacetItem, active: bool) -> FacetEntry {
    FacetEntry {
        name: item.name.clone(),
        display_name: item.display_name.clone(),
        count: item.count,
        active,
    }
}

/// Up to three datasets tagged `featured`, topped up with the most recently
/// modified ones.
pub fn featured_datasets(extension: &Extension, context: &Context) -> Result<Vec<Dataset>> {
    let featured = SearchParams::default()
        .with_fq("tags:featured")
        .with_sort("metadata_modified desc")
        .with_rows(FEATURED_COUNT as u64);
    let recent = SearchParams {
        q: Some("*:*".to_owned()),
        ..Default::default()
    }
    .with_sort("metadata_modified desc")
    .with_rows(FEATURED_COUNT as u64);

    let mut datasets = extension.catalog.package_search(context, &featured)?.results;
    datasets.extend(extension.catalog.package_search(context, &recent)?.results);
    datasets.truncate(FEATURED_COUNT);
    Ok(datasets)
}

pub fn user_fullname(extension: &Extension, context: &Context, user_id: &str) -> Result<Option<String>> {
    Ok(extension.catalog.user_show(context, user_id)?.fullname)
}

pub fn all_groups(extension: &Extension, context: &Context) -> Result<Vec<Organization>> {
    extension.catalog.group_list(context)
}

/// "Tanzania, Republic of" becomes "Republic of Tanzania". Anything without
/// exactly one comma is returned as is.
pub fn comma_swap(input: &str) -> String {
    match input.split_once(',') {
        Some((before, after)) if !after.contains(',') => {
            format!("{} {}", after.trim(), before.trim())
        }
        _ => input.to_owned(),
    }
}

fn parse_month(month: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
        .map_err(|_| Error::invalid_field("month", "Must be a month in the form YYYY-MM"))
}

/// "2023-09" becomes "Sep 2023".
pub fn month_formatter(month: &str) -> Result<String> {
    Ok(parse_month(month)?.format("%b %Y").to_string())
}

fn invalid_format(format: &str) -> Error {
    Error::invalid_field("format", format!("Not a valid date format: {format}"))
}

/// Every date in `month` falling on `weekday` (0 is Monday), formatted with
/// `format`.
pub fn dates_of_weekday_in_month(month: &str, weekday: u32, format: &str) -> Result<Vec<String>> {
    let items = StrftimeItems::new(format).collect::<Vec<_>>();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(invalid_format(format));
    }

    let month_start = parse_month(month)?;
    let offset = (7 + weekday as i64 - month_start.weekday().num_days_from_monday() as i64) % 7;

    let mut date = month_start + Duration::days(offset);
    let mut dates = Vec::new();
    while date.month() == month_start.month() {
        // Time and zone specifiers have nothing to print for a bare date.
        let mut formatted = String::new();
        write!(formatted, "{}", date.format_with_items(items.iter()))
            .map_err(|_| invalid_format(format))?;
        dates.push(formatted);
        date += Duration::weeks(1);
    }
    Ok(dates)
}

/// One option per reporting week of `month`, each week ending on a Friday.
pub fn week_options(month: &str) -> Result<Vec<WeekOption>> {
    let labels = dates_of_weekday_in_month(month, FRIDAY, "%d %b %Y")?;
    let values = dates_of_weekday_in_month(month, FRIDAY, "%Y-%m-%d")?;
    Ok(labels
        .into_iter()
        .zip(values)
        .enumerate()
        .map(|(index, (label, value))| WeekOption {
            text: format!("Week {} (ending {})", index + 1, label),
            value,
        })
        .collect())
}

fn to_value(result: impl Serialize) -> Result<Value> {
    serde_json::to_value(result).map_err(|source| Error::Unknown {
        message: "Could not serialise helper result".to_owned(),
        source: Box::new(source),
    })
}

/// Run the helper called `name`.
pub fn call(
    extension: &Extension,
    context: &Context,
    name: &str,
    data: Map<String, Value>,
) -> Result<Value> {
    match name {
        "get_dataset_from_id" => to_value(crate::actions::dataset::dataset_from_id(
            extension,
            required_str(&data, "id")?,
        )?),
        "get_facet_items_dict" => {
            let request: FacetItemsRequest = serde_json::from_value(Value::Object(data))
                .map_err(|error| Error::invalid(format!("Invalid facet request: {error}")))?;
            to_value(facet_items(
                &request.facet,
                &request.search_facets,
                &request.params,
                request.limit,
                request.exclude_active,
            ))
        }
        "get_all_groups" => to_value(all_groups(extension, context)?),
        "get_featured_datasets" => to_value(featured_datasets(extension, context)?),
        "get_user_from_id" => to_value(user_fullname(
            extension,
            context,
            required_str(&data, "id")?,
        )?),
        "comma_swap_formatter" => to_value(comma_swap(required_str(&data, "input")?)),
        "lower_formatter" => to_value(required_str(&data, "input")?.to_lowercase()),
        "month_formatter" => to_value(month_formatter(required_str(&data, "month")?)?),
        "get_dates_of_weekday_in_month" => {
            let weekday = match data.get("weekday") {
                None | Some(Value::Null) => FRIDAY,
                Some(Value::Number(weekday)) => weekday
                    .as_u64()
                    .filter(|weekday| *weekday < 7)
                    .ok_or_else(|| Error::invalid_field("weekday", "Must be between 0 and 6"))?
                    as u32,
                Some(Value::String(weekday)) => weekday
                    .parse::<u32>()
                    .ok()
                    .filter(|weekday| *weekday < 7)
                    .ok_or_else(|| Error::invalid_field("weekday", "Must be between 0 and 6"))?,
                Some(_) => return Err(Error::invalid_field("weekday", "Must be between 0 and 6")),
            };
            let format = data
                .get("format")
                .and_then(Value::as_str)
                .unwrap_or("%d %b %Y");
            to_value(dates_of_weekday_in_month(
                required_str(&data, "month")?,
                weekday,
                format,
            )?)
        }
        "get_week_options" => to_value(week_options(required_str(&data, "month")?)?),
        "get_login_view" => to_value(&extension.settings.login_view),
        "dataset_facets" => Ok(Value::Object(
            DATASET_FACETS
                .iter()
                .map(|(facet, title)| ((*facet).to_owned(), json!(title)))
                .collect(),
        )),
        _ => Err(Error::not_found(format!("Helper name not known: {name}"))),
    }
}
