//! `omvly snapshot`: one full refresh, printed once.

use std::sync::Arc;

use tracing::debug;

use omvly_core::{NullSink, Poller};

use crate::cli::{GlobalOpts, SnapshotArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: SnapshotArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let poller_config = config::build_poller_config(global, None, None)?;
    let poller = Poller::from_config(poller_config, Arc::new(NullSink))?;

    let refreshed = poller.refresh_all().await;
    if poller.connected() {
        if let Err(e) = poller.transport().logout().await {
            debug!(error = %e, "logout failed");
        }
    }
    refreshed?;

    let snapshot = poller.snapshot();
    let out = output::render_snapshot(global.output, &snapshot, args.category.map(Into::into))?;
    output::print_output(&out, global.quiet);
    Ok(())
}
