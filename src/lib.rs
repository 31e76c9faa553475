// Schema-driven ingestion adapter: JSON records in, typed inserts out.

pub mod adapter;
pub mod assembler;
pub mod coercion;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod mapping;
pub mod sink;

use crate::adapter::Adapter;
use crate::config::RuntimeSettings;
use crate::error::AdapterError;
use crate::host::{EventReader, StdoutNotifier};
use crate::sink::SqlxConnector;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

/// Serve the host over stdin/stdout until it closes the channel. Ctrl-C
/// triggers the same graceful shutdown as a `close` event.
pub async fn run(settings: RuntimeSettings) -> Result<(), AdapterError> {
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_token.cancel();
        }
    });

    log::info!(
        "fieldcast {} waiting for host events on stdin",
        env!("CARGO_PKG_VERSION")
    );

    let adapter = Adapter::new(
        Arc::new(SqlxConnector),
        Arc::new(StdoutNotifier::stdout()),
        settings,
    );
    let events = EventReader::new(BufReader::new(tokio::io::stdin()));

    let result = adapter.run(events, cancel.clone()).await;
    cancel.cancel();
    result
}
