use anyhow::{Context, Result};
use std::{net::SocketAddr, sync::Arc};
use structopt::StructOpt;

use crate::{actions::Extension, server};

#[derive(Debug, StructOpt)]
pub struct ServeArgs {
    #[structopt(long = "bind", default_value = "127.0.0.1:8080")]
    /// Address the HTTP service listens on
    bind: SocketAddr,

    #[structopt(long = "worker-threads")]
    /// Number of runtime worker threads. Defaults to one per core.
    worker_threads: Option<usize>,
}

pub fn run(args: &ServeArgs, extension: Extension) -> Result<()> {
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(worker_threads) = args.worker_threads {
        builder.worker_threads(worker_threads);
    }
    let runtime = builder
        .build()
        .context("Could not start the async runtime")?;

    // The blocking catalog client and the function client's own runtime must
    // be dropped outside this runtime, so the last reference stays here.
    let extension = Arc::new(extension);
    let served = runtime.block_on(server::serve(extension.clone(), args.bind));
    drop(runtime);
    drop(extension);
    served
}
