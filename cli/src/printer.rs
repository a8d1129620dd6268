use colored::Colorize;
use prettytable::{cell, format, row, Row, Table};
use serde::Serialize;
use who_romania_client::{Dataset, Organization, User};

use anyhow::{anyhow, Context, Error, Result};
use std::{
    io::{self, Write},
    str::FromStr,
};

pub fn print_resources_as_json<Resource>(
    resources: impl IntoIterator<Item = Resource>,
    mut writer: impl Write,
) -> Result<()>
where
    Resource: Serialize,
{
    for resource in resources {
        serde_json::to_writer(&mut writer, &resource)
            .context("Could not serialise resource.")
            .and_then(|_| writeln!(writer).context("Failed to write JSON resource to writer."))?;
    }
    Ok(())
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    #[default]
    Table,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(string: &str) -> Result<Self> {
        if string == "table" {
            Ok(OutputFormat::Table)
        } else if string == "json" {
            Ok(OutputFormat::Json)
        } else {
            Err(anyhow!("{}", string))
        }
    }
}

/// Represents a resource that is able to be displayed as a table.
///
/// The implementation must implement `to_table_headers` to return headers for the resource type,
/// and `to_table_row`, which should return a data row for the given resource instance.
pub trait DisplayTable {
    fn to_table_headers() -> Row;

    fn to_table_row(&self) -> Row;
}

fn or_missing(value: Option<&str>) -> colored::ColoredString {
    match value {
        Some(value) => value.normal(),
        None => "missing".dimmed(),
    }
}

impl DisplayTable for Dataset {
    fn to_table_headers() -> Row {
        row![bFg => "Name", "ID", "Type", "Organization", "Modified", "Title"]
    }

    fn to_table_row(&self) -> Row {
        row![
            or_missing(self.name.as_ref().map(|name| name.0.as_str())),
            or_missing(self.id.as_ref().map(|id| id.0.as_str())),
            self.dataset_type.as_deref().unwrap_or("dataset"),
            or_missing(self.owner_org.as_deref()),
            or_missing(self.metadata_modified.as_deref()),
            self.title.as_deref().unwrap_or_default()
        ]
    }
}

impl DisplayTable for User {
    fn to_table_headers() -> Row {
        row![bFg => "Name", "Email", "ID", "Full Name", "Created"]
    }

    fn to_table_row(&self) -> Row {
        let name = if self.sysadmin {
            format!("{} {}", self.name.0, "(sysadmin)".dimmed())
        } else {
            self.name.0.clone()
        };
        row![
            name,
            or_missing(self.email.as_ref().map(|email| email.0.as_str())),
            self.id.0,
            self.fullname.as_deref().unwrap_or_default(),
            or_missing(self.created.as_deref()),
        ]
    }
}

impl DisplayTable for Organization {
    fn to_table_headers() -> Row {
        row![bFg => "Name", "ID", "Datasets", "Title"]
    }

    fn to_table_row(&self) -> Row {
        row![
            self.name,
            self.id,
            match self.package_count {
                Some(count) => count.to_string().normal(),
                None => "unknown".dimmed(),
            },
            self.title
        ]
    }
}

/// Helper trait to allow collection of resources to be converted into a table.
pub trait IntoTable {
    fn into_table(self) -> Table;
}

/// All iterators of resources can be converted into a table.
impl<'a, Iterable, Item: 'a> IntoTable for Iterable
where
    Iterable: IntoIterator<Item = &'a Item>,
    Item: DisplayTable,
{
    fn into_table(self) -> Table {
        let mut table = new_table();
        table.set_titles(Item::to_table_headers());
        for resource in self.into_iter() {
            table.add_row(resource.to_table_row());
        }
        table
    }
}

pub fn new_table() -> Table {
    let mut table = Table::new();
    let format = format::FormatBuilder::new()
        .column_separator(' ')
        .borders(' ')
        .separators(&[], format::LineSeparator::new('-', '+', '+', '+'))
        .padding(0, 1)
        .build();
    table.set_format(format);
    table
}

fn print_table<T: IntoTable>(resources: T) {
    let table = resources.into_table();
    table.printstd();
}

/// Print resources using the selected output format.
///
/// Resources passed to the printer must be able to be formatted using all supported
/// `OutputFormat`s.
#[derive(Default, Debug)]
pub struct Printer {
    output: OutputFormat,
}

impl Printer {
    pub fn new(output: OutputFormat) -> Self {
        Self { output }
    }

    pub fn print_resources<T, Resource>(&self, resources: T) -> Result<()>
    where
        T: IntoIterator<Item = Resource> + IntoTable,
        Resource: Serialize,
    {
        match self.output {
            OutputFormat::Table => print_table(resources),
            OutputFormat::Json => print_resources_as_json(resources, io::stdout().lock())?,
        };
        Ok(())
    }

    /// Results without a table form are always printed as JSON.
    pub fn print_value(&self, value: &impl Serialize) -> Result<()> {
        print_resources_as_json([value], io::stdout().lock())
    }
}
