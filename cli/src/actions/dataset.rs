use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use who_romania_client::{
    Context, Dataset, DatasetId, Error, NewRelationship, RelationshipType, Result, SearchParams,
    Tag,
};

use crate::{
    actions::{best_effort, identifier, required, slug, Extension},
    authz,
};

const TAGS_FORMAT_MESSAGE: &str = "Must specify 'tags' dict of tags for update in form \
     {'old_tag_name1': 'new_tag_name1', 'old_tag_name2': 'new_tag_name2'}";

/// Facets shown on dataset search pages, in display order.
pub const DATASET_FACETS: [(&str, &str); 3] = [
    ("type", "Projection Types"),
    ("country_name", "Countries"),
    ("tags", "Tags"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagReplaceSummary {
    pub datasets_modified: usize,
}

fn string_field<'data>(data: &'data Map<String, Value>, field: &str) -> Option<&'data str> {
    data.get(field).and_then(Value::as_str)
}

/// Reject dataset types the catalog has no schema for.
fn check_dataset_type(extension: &Extension, context: &Context, data: &Map<String, Value>) -> Result<()> {
    let dataset_type = match data.get("type") {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::String(dataset_type)) if dataset_type.is_empty() => return Ok(()),
        Some(Value::String(dataset_type)) => dataset_type.clone(),
        Some(other) => other.to_string(),
    };

    let mut valid_types = extension.catalog.dataset_schema_types(context)?;
    if !valid_types.iter().any(|valid| valid == "dataset") {
        valid_types.push("dataset".to_owned());
    }

    if valid_types.contains(&dataset_type) {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "Type '{}' is invalid, valid types are: '{}'",
            dataset_type,
            valid_types.join(", ")
        )))
    }
}

/// Chained `package_create`: type allow-list, then name generation, then the
/// catalog's own create.
pub fn package_create(
    extension: &Extension,
    context: &Context,
    mut data: Map<String, Value>,
    rng: &mut impl Rng,
) -> Result<Dataset> {
    check_dataset_type(extension, context, &data)?;

    let name = slug::generate_name(
        extension.catalog.as_ref(),
        string_field(&data, "title"),
        string_field(&data, "name"),
        None,
        rng,
    )?;
    data.insert("name".to_owned(), Value::String(name.0));

    let dataset = Dataset::from_fields(data)?;
    let created = extension.catalog.package_create(context, &dataset)?;
    info!(
        "Created dataset `{}` [id: {}]",
        created.name.as_ref().map(|name| name.0.as_str()).unwrap_or_default(),
        created.required_id()?.0
    );
    Ok(created)
}

/// Chained `package_update`: the stored dataset is the one being edited, so
/// its name is kept whatever the payload says.
pub fn package_update(
    extension: &Extension,
    context: &Context,
    mut data: Map<String, Value>,
    rng: &mut impl Rng,
) -> Result<Dataset> {
    let id_or_name = identifier(required(&data, "id")?)
        .ok_or_else(|| Error::invalid_field("id", "Must be a string"))?;
    let existing = extension.catalog.package_show(context, &id_or_name)?;

    let name = slug::generate_name(
        extension.catalog.as_ref(),
        string_field(&data, "title"),
        string_field(&data, "name"),
        Some(&existing),
        rng,
    )?;
    data.insert("name".to_owned(), Value::String(name.0));
    data.insert(
        "id".to_owned(),
        Value::String(existing.required_id()?.0.clone()),
    );

    let dataset = Dataset::from_fields(data)?;
    extension.catalog.package_update(context, &dataset)
}

/// Copy a dataset, apply the payload's overrides, and record where the copy
/// came from.
pub fn dataset_duplicate(
    extension: &Extension,
    context: &Context,
    mut data: Map<String, Value>,
    rng: &mut impl Rng,
) -> Result<Dataset> {
    let source_ref = identifier(required(&data, "id")?)
        .ok_or_else(|| Error::invalid_field("id", "Must be a string"))?;
    let mut copy = extension.catalog.package_show(context, &source_ref)?;
    let source_id = copy.required_id()?.clone();

    copy.id = None;
    copy.name = None;
    data.remove("id");
    data.remove("name");

    let mut copy = copy.merged_with(&data)?;
    for resource in copy.resources.iter_mut() {
        resource.id = None;
        resource.package_id = None;
    }

    let fields = match serde_json::to_value(&copy) {
        Ok(Value::Object(fields)) => fields,
        _ => return Err(Error::invalid("Could not copy dataset fields")),
    };
    let duplicate = package_create(extension, context, fields, rng)?;
    let duplicate_id = duplicate.required_id()?.clone();

    record_duplication(extension, context, &source_id, &duplicate_id);

    extension.catalog.package_show(context, &duplicate_id.0)
}

fn record_duplication(
    extension: &Extension,
    context: &Context,
    source_id: &DatasetId,
    duplicate_id: &DatasetId,
) {
    let comment = best_effort(
        format!("get current activity for package {}", source_id.0),
        || {
            extension
                .catalog
                .package_activity_list(context, &source_id.0)?
                .into_iter()
                .next()
                .map(|activity| format!("Duplicated from activity {}", activity.id.0))
                .ok_or_else(|| Error::not_found("Dataset has no activity"))
        },
    );

    let relationship = NewRelationship {
        subject: duplicate_id.clone(),
        object: source_id.clone(),
        kind: RelationshipType::ChildOf,
        comment,
    };
    best_effort(
        format!(
            "record duplication of {} to {}",
            source_id.0, duplicate_id.0
        ),
        || {
            extension
                .catalog
                .package_relationship_create(context, &relationship)
        },
    );
}

/// The search filter restricted to datasets carrying any of `tags`.
fn restrict_to_tags(caller_fq: Option<&Value>, tags: &Map<String, Value>) -> String {
    let restriction = tags
        .keys()
        .map(|tag| format!("tags:{tag}"))
        .collect::<Vec<_>>()
        .join(" OR ");
    match caller_fq {
        None | Some(Value::Null) => format!("({restriction})"),
        Some(Value::String(fq)) => format!("({fq}) AND ({restriction})"),
        Some(fq) => format!("({fq}) AND ({restriction})"),
    }
}

fn replace_tags(original: &[Tag], replacements: &Map<String, Value>) -> Vec<Tag> {
    original
        .iter()
        .map(|tag| match replacements.get(&tag.name).and_then(Value::as_str) {
            Some(replacement) => Tag::new(replacement),
            None => tag.clone(),
        })
        .collect()
}

/// Rename tags on every dataset matching the payload's search parameters.
///
/// Every matching dataset is checked for edit rights before any is changed.
/// The patches themselves are not atomic: a dataset edited concurrently may
/// lose one side's tag changes.
pub fn dataset_tag_replace(
    extension: &Extension,
    context: &Context,
    mut data: Map<String, Value>,
) -> Result<TagReplaceSummary> {
    let tags = match data.remove("tags") {
        Some(Value::Object(tags))
            if !tags.is_empty() && tags.values().all(Value::is_string) =>
        {
            tags
        }
        _ => return Err(Error::invalid(TAGS_FORMAT_MESSAGE)),
    };

    let fq = restrict_to_tags(data.get("fq"), &tags);
    data.insert("fq".to_owned(), Value::String(fq));
    let params: SearchParams = serde_json::from_value(Value::Object(data))
        .map_err(|error| Error::invalid(format!("Invalid search parameters: {error}")))?;

    let datasets = extension.catalog.package_search(context, &params)?.results;

    for dataset in &datasets {
        authz::authorize_dataset_update(extension, context, dataset)?;
    }

    for dataset in &datasets {
        let final_tags = replace_tags(&dataset.tags, &tags);
        let mut fields = Map::new();
        fields.insert("tags".to_owned(), json!(final_tags));
        extension
            .catalog
            .package_patch(context, &dataset.required_id()?.0, &fields)?;
    }

    info!("Replaced tags on {} datasets", datasets.len());
    Ok(TagReplaceSummary {
        datasets_modified: datasets.len(),
    })
}

/// Lookup used by templates, bypassing authorization.
pub fn dataset_from_id(extension: &Extension, id: &str) -> Result<Dataset> {
    extension.catalog.package_show(&Context::site(), id)
}
