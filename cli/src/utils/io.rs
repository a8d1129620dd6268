use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use env_logger::{fmt::Formatter as LogFormatter, Builder as LogBuilder};
use log::{Level as LogLevel, LevelFilter as LogLevelFilter, Record as LogRecord};
use once_cell::sync::Lazy;
use std::{
    env,
    io::{self, Write},
    ops::Deref,
};

fn level_prefix(level: LogLevel) -> &'static ColoredString {
    match level {
        LogLevel::Debug => LOG_PREFIX_DEBUG.deref(),
        LogLevel::Info => LOG_PREFIX_INFO.deref(),
        LogLevel::Warn => LOG_PREFIX_WARN.deref(),
        LogLevel::Error => LOG_PREFIX_ERROR.deref(),
        LogLevel::Trace => LOG_PREFIX_TRACE.deref(),
    }
}

/// Install the coloured logger. `RUST_LOG` overrides the level picked by
/// `verbose`.
///
/// A long running service stamps each line with the time, one-shot commands
/// don't.
pub fn init_env_logger(verbose: bool, timestamps: bool) {
    let mut builder = LogBuilder::new();
    if timestamps {
        builder.format(|formatter: &mut LogFormatter, record: &LogRecord<'_>| {
            writeln!(
                formatter,
                "{} {} {}",
                formatter.timestamp_millis(),
                level_prefix(record.level()),
                record.args()
            )
        });
    } else {
        builder.format(|formatter: &mut LogFormatter, record: &LogRecord<'_>| {
            writeln!(formatter, "{} {}", level_prefix(record.level()), record.args())
        });
    }
    builder.filter(
        None,
        if verbose {
            LogLevelFilter::Debug
        } else {
            LogLevelFilter::Info
        },
    );

    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }

    builder.init();
}

fn prompt(message: &str) -> Result<String> {
    let mut input = String::new();
    write!(io::stderr(), "{} {}: ", LOG_PREFIX_INPUT.deref(), message)
        .and_then(|_| io::stderr().flush())
        .and_then(|_| io::stdin().read_line(&mut input))
        .with_context(|| format!("Failed to read `{message}` from stdin."))?;
    Ok(input.trim().to_owned())
}

pub fn read_token_from_stdin() -> Result<Option<String>> {
    let input = prompt("Enter API token [none]")?;
    Ok(if !input.is_empty() { Some(input) } else { None })
}

pub static LOG_PREFIX_DEBUG: Lazy<ColoredString> = Lazy::new(|| "D".normal());
pub static LOG_PREFIX_INFO: Lazy<ColoredString> = Lazy::new(|| "I".green());
pub static LOG_PREFIX_WARN: Lazy<ColoredString> = Lazy::new(|| "W".yellow().bold());
pub static LOG_PREFIX_ERROR: Lazy<ColoredString> = Lazy::new(|| "E".red().bold());
pub static LOG_PREFIX_TRACE: Lazy<ColoredString> = Lazy::new(|| "T".normal());
pub static LOG_PREFIX_INPUT: Lazy<ColoredString> = Lazy::new(|| "*".blue().bold());
