//! `omvly watch`: run both cadences and print every published snapshot.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use omvly_core::{Category, Poller, Snapshot};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

pub async fn handle(args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let poller_config =
        config::build_poller_config(global, args.fast_interval, args.slow_interval)?;
    let (sink, _) = broadcast::channel::<Arc<str>>(16);
    let sink = Arc::new(sink);
    let poller = Poller::from_config(poller_config, sink.clone())?;
    let category: Option<Category> = args.category.map(Into::into);

    poller.refresh_all().await?;
    emit(&poller.snapshot(), global, category)?;
    let mut printed: u32 = 1;

    let mut updates = sink.subscribe();
    poller.start().await;
    info!(topic = poller.signal_update(), "watching for updates");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let result = loop {
        if args.count.is_some_and(|n| printed >= n) {
            break Ok(());
        }
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted");
                break Ok(());
            }
            msg = updates.recv() => match msg {
                Ok(topic) => {
                    debug!(%topic, "snapshot published");
                    if let Err(e) = emit(&poller.snapshot(), global, category) {
                        break Err(e);
                    }
                    printed = printed.saturating_add(1);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "update receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break Ok(()),
            },
        }
    };

    poller.stop().await;
    if let Err(e) = poller.transport().logout().await {
        debug!(error = %e, "logout failed");
    }
    result
}

fn emit(snapshot: &Snapshot, global: &GlobalOpts, category: Option<Category>) -> Result<(), CliError> {
    let out = output::render_snapshot(global.output, snapshot, category)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
