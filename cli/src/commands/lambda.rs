use anyhow::{Context, Result};
use log::info;
use serde_json::{Map, Value};
use structopt::StructOpt;

use super::{JsonObject, Session};
use crate::{actions::lambda, printer::Printer};

#[derive(Debug, StructOpt)]
pub enum LambdaArgs {
    #[structopt(name = "invoke")]
    /// Queue a run of a remote function
    Invoke {
        #[structopt(name = "function")]
        /// Name of the function to run
        function: String,

        #[structopt(long = "payload")]
        /// Extra fields for the function's payload, as a JSON object
        payload: Option<JsonObject>,
    },

    #[structopt(name = "logs")]
    /// Print a remote function's log messages
    Logs {
        #[structopt(name = "function")]
        /// Name of the function whose logs to show
        function: String,

        #[structopt(long = "stream")]
        /// Read this log stream instead of the most recent one
        stream: Option<String>,
    },
}

pub fn run(args: &LambdaArgs, session: &Session, printer: &Printer) -> Result<()> {
    let context = session.context()?;
    match args {
        LambdaArgs::Invoke { function, payload } => {
            let mut data = payload.clone().unwrap_or_default().0;
            data.insert("lambda_function".to_owned(), Value::String(function.clone()));
            let response = lambda::lambda_invoke(&session.extension, &context, data)
                .with_context(|| format!("Could not invoke `{function}`"))?;
            info!("Queued a run of `{}`", function);
            printer.print_value(&response)
        }
        LambdaArgs::Logs { function, stream } => {
            let mut data = Map::new();
            data.insert("lambda_function".to_owned(), Value::String(function.clone()));
            if let Some(stream) = stream {
                data.insert("log_stream_name".to_owned(), Value::String(stream.clone()));
            }
            let logs = lambda::lambda_logs(&session.extension, &context, data)
                .with_context(|| format!("Could not get logs for `{function}`"))?;
            if logs.events.is_empty() {
                info!("Nothing logged yet.");
            }
            for event in logs.events {
                println!("{}", event.message.trim_end());
            }
            Ok(())
        }
    }
}
