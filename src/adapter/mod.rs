// =====================================================
// ADAPTER RUNTIME
// Startup handshake, record fan-out and graceful shutdown
// =====================================================

use crate::assembler::{RowAssembler, SqlDialect};
use crate::config::{AdapterOptions, RuntimeSettings};
use crate::error::AdapterError;
use crate::host::{EventReader, HostEvent, HostNotifier, Notification};
use crate::sink::{Sink, SinkConnector};
use futures::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::io::AsyncBufRead;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub const INVALID_DATA_MESSAGE: &str =
    "Invalid data received. Data must be a valid Array/JSON Object or a collection of objects.";

/// Everything a record needs, built once at startup and never mutated.
pub struct AdapterContext {
    assembler: RowAssembler,
    sink: Arc<dyn Sink>,
}

impl AdapterContext {
    pub fn new(assembler: RowAssembler, sink: Arc<dyn Sink>) -> Self {
        Self { assembler, sink }
    }

    pub fn table(&self) -> &str {
        self.assembler.table()
    }

    pub fn dialect(&self) -> SqlDialect {
        self.assembler.dialect()
    }
}

/// Validate the `ready` options and connect. Nothing touches the sink until
/// the schema and options are known to be valid.
pub async fn start(
    options: Value,
    connector: &dyn SinkConnector,
) -> Result<AdapterContext, AdapterError> {
    let options = AdapterOptions::from_value(options)?;
    let mappings = options.field_mappings()?;
    options.validate()?;

    let dialect = options.dialect()?;
    let assembler = RowAssembler::new(dialect, &options.qualified_table(), mappings)?;
    log::info!(
        "Field mapping validated: {} column(s) into {}",
        assembler.mappings().len(),
        assembler.table()
    );

    let sink_options = options.sink_options()?;
    let sink = connector
        .connect(&sink_options)
        .await
        .map_err(|e| AdapterError::Connection(e.to_string()))?;

    if sink.dialect() != dialect {
        let message = format!(
            "Connector returned a {} sink for a {} configuration",
            sink.dialect(),
            dialect
        );
        sink.close().await;
        return Err(AdapterError::Configuration(message));
    }

    Ok(AdapterContext::new(assembler, sink))
}

/// Coerce, assemble and insert one record.
pub async fn process_record(
    context: &AdapterContext,
    record: &Map<String, Value>,
) -> Result<u64, AdapterError> {
    let statement = context.assembler.assemble_row(record).await;
    context
        .sink
        .execute(&statement)
        .await
        .map_err(|e| AdapterError::Insert {
            table: context.table().to_string(),
            message: e.to_string(),
        })
}

/// Split a data payload into records. Non-object batch members are reported
/// individually; their siblings still go through.
pub fn split_records(payload: Value) -> (Vec<Map<String, Value>>, Vec<AdapterError>) {
    match payload {
        Value::Object(record) => (vec![record], Vec::new()),
        Value::Array(items) => {
            let mut records = Vec::with_capacity(items.len());
            let mut errors = Vec::new();
            for item in items {
                match item {
                    Value::Object(record) => records.push(record),
                    _ => errors.push(invalid_data()),
                }
            }
            (records, errors)
        }
        _ => (Vec::new(), vec![invalid_data()]),
    }
}

fn invalid_data() -> AdapterError {
    AdapterError::InvalidData(INVALID_DATA_MESSAGE.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

enum Step {
    Event(Option<Result<HostEvent, AdapterError>>),
    Reaped,
    Cancelled,
}

pub struct Adapter {
    connector: Arc<dyn SinkConnector>,
    notifier: Arc<dyn HostNotifier>,
    settings: RuntimeSettings,
    semaphore: Arc<Semaphore>,
    context: Option<Arc<AdapterContext>>,
    tasks: JoinSet<()>,
}

impl Adapter {
    pub fn new(
        connector: Arc<dyn SinkConnector>,
        notifier: Arc<dyn HostNotifier>,
        settings: RuntimeSettings,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(settings.max_inflight_records()));
        Self {
            connector,
            notifier,
            settings,
            semaphore,
            context: None,
            tasks: JoinSet::new(),
        }
    }

    /// Serve host events until `close`, end of input, cancellation or a fatal
    /// error. Fatal errors are reported to the host before being returned.
    pub async fn run<R>(
        mut self,
        mut events: EventReader<R>,
        cancel: CancellationToken,
    ) -> Result<(), AdapterError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut fatal = None;

        loop {
            let step = tokio::select! {
                _ = cancel.cancelled() => Step::Cancelled,
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    log_task_outcome(joined);
                    Step::Reaped
                }
                event = events.next_event() => Step::Event(event),
            };

            let event = match step {
                Step::Reaped => continue,
                Step::Cancelled => {
                    log::info!("Shutdown requested");
                    break;
                }
                Step::Event(None) => {
                    log::info!("Host input closed");
                    break;
                }
                Step::Event(Some(event)) => event,
            };

            let outcome = match event {
                Ok(event) => self.handle_event(event).await,
                Err(error) => Err(error),
            };

            match outcome {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(error) => {
                    log::error!("{}", error);
                    self.report(Notification::error(&error)).await;
                    if error.is_fatal() {
                        fatal = Some(error);
                        break;
                    }
                }
            }
        }

        self.shutdown().await;

        match fatal {
            Some(error) => Err(error),
            None => {
                self.report(Notification::Close).await;
                Ok(())
            }
        }
    }

    /// Apply one host event. Errors returned here are reported by the caller.
    pub async fn handle_event(&mut self, event: HostEvent) -> Result<Flow, AdapterError> {
        match event {
            HostEvent::Ready(payload) => {
                if self.context.is_some() {
                    log::warn!("Ignoring repeated ready event");
                    return Ok(Flow::Continue);
                }

                let context = start(payload.options, self.connector.as_ref()).await?;
                log::info!(
                    "Adapter ready: {} sink, table {}",
                    context.dialect(),
                    context.table()
                );
                self.context = Some(Arc::new(context));
                self.report(Notification::Ready).await;
                Ok(Flow::Continue)
            }
            HostEvent::Data(payload) => {
                let Some(context) = self.context.clone() else {
                    return Err(AdapterError::Protocol(
                        "data received before ready".to_string(),
                    ));
                };
                self.dispatch(context, payload).await;
                Ok(Flow::Continue)
            }
            HostEvent::Close => {
                log::info!("Close requested by host");
                Ok(Flow::Stop)
            }
        }
    }

    async fn dispatch(&mut self, context: Arc<AdapterContext>, payload: Value) {
        let (records, errors) = split_records(payload);

        for error in errors {
            log::warn!("{}", error);
            self.report(Notification::error(&error)).await;
        }

        for record in records {
            let permit = match self.semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    log::error!("Record semaphore closed: {}", e);
                    return;
                }
            };

            let context = context.clone();
            let notifier = self.notifier.clone();
            self.tasks.spawn(async move {
                let _permit = permit;
                let outcome = AssertUnwindSafe(process_record(&context, &record))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let message = format!("record task panicked: {}", panic_message(&*panic));
                        Err(AdapterError::Insert {
                            table: context.table().to_string(),
                            message,
                        })
                    });
                let notification = match outcome {
                    Ok(_) => Notification::inserted(&record),
                    Err(error) => {
                        log::error!("{}", error);
                        Notification::error(&error)
                    }
                };
                if let Err(e) = notifier.notify(notification).await {
                    log::error!("Failed to notify host: {}", e);
                }
            });
        }
    }

    /// Let in-flight records finish within the grace period, abort the rest,
    /// then release the sink.
    async fn shutdown(&mut self) {
        let grace = self.settings.shutdown_grace();
        let in_flight = self.tasks.len();
        if in_flight > 0 {
            log::info!("Waiting up to {:?} for {} in-flight record(s)", grace, in_flight);
        }

        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = self.tasks.join_next().await {
                log_task_outcome(joined);
            }
        })
        .await;

        if drained.is_err() {
            log::warn!(
                "Shutdown grace elapsed; aborting {} in-flight record(s)",
                self.tasks.len()
            );
            self.tasks.abort_all();
            while self.tasks.join_next().await.is_some() {}
        }

        if let Some(context) = self.context.take() {
            context.sink.close().await;
            log::info!("Sink connection closed");
        }
    }

    async fn report(&self, notification: Notification) {
        if let Err(e) = self.notifier.notify(notification).await {
            log::error!("Failed to notify host: {}", e);
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

fn log_task_outcome(joined: Result<(), tokio::task::JoinError>) {
    if let Err(join_err) = joined {
        if join_err.is_panic() {
            log::error!("Record task panicked: {}", join_err);
        }
    }
}
