//! `kgraph-worker` -- flow-inference queue worker.
//!
//! Consumes flow-inference jobs from the Redis task queue, bridges each
//! one into the asynchronous analysis engine, and reports success or
//! failure to the result backend.
//!
//! # Environment variables
//!
//! | Variable                | Required | Default     | Description                                |
//! |-------------------------|----------|-------------|--------------------------------------------|
//! | `FLOW_API_URL`          | yes      | --          | Base URL of the flow-analysis engine       |
//! | `REDISHOST`             | no       | `localhost` | Broker host                                |
//! | `REDISPORT`             | no       | `6379`      | Broker port                                |
//! | `REDISUSER`             | no       | --          | Broker username                            |
//! | `REDISPASSWORD`         | no       | --          | Broker password                            |
//! | `CELERY_QUEUE_NAME`     | no       | `staging`   | Default queue for unrouted tasks           |
//! | `WORKER_CONCURRENCY`    | no       | `4`         | Parallel consumer loops                    |
//! | `WORKER_HEARTBEAT_SECS` | no       | `120`       | Heartbeat publish interval                 |
//! | `SENTRY_WORKER_DSN`     | no       | --          | Crash reporting DSN (disabled when absent) |

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kgraph_broker::{heartbeat, BrokerConfig, QueueConsumer};
use kgraph_flow::FlowApiClient;
use kgraph_worker::dispatcher::Dispatcher;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "kgraph_worker=debug,kgraph_broker=debug,kgraph_flow=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let _sentry_guard = init_crash_reporting();

    let config = BrokerConfig::from_env();

    let flow_api_url = std::env::var("FLOW_API_URL").unwrap_or_else(|_| {
        tracing::error!("FLOW_API_URL environment variable is required");
        std::process::exit(1);
    });

    let worker_id = uuid::Uuid::new_v4().to_string();

    tracing::info!(
        worker_id = %worker_id,
        host = %config.host,
        port = config.port,
        default_queue = %config.default_queue,
        concurrency = config.concurrency,
        flow_api_url = %flow_api_url,
        "Starting kgraph-worker",
    );

    let analyzer = Arc::new(FlowApiClient::new(flow_api_url));
    let dispatcher = Arc::new(Dispatcher::new(analyzer));

    let cancel = CancellationToken::new();

    let heartbeat_client = match redis::Client::open(config.redis_url()) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Invalid broker URL");
            std::process::exit(1);
        }
    };
    let heartbeat_handle = tokio::spawn({
        let cancel = cancel.clone();
        let worker_id = worker_id.clone();
        let interval = Duration::from_secs(config.heartbeat_interval_secs);
        async move { heartbeat::run(heartbeat_client, &worker_id, interval, cancel).await }
    });

    let mut consumer_handles = Vec::with_capacity(config.concurrency);
    for _ in 0..config.concurrency {
        let consumer = match QueueConsumer::new(&config, dispatcher.clone()) {
            Ok(consumer) => consumer,
            Err(e) => {
                tracing::error!(error = %e, "Failed to create queue consumer");
                std::process::exit(1);
            }
        };
        let cancel = cancel.clone();
        consumer_handles.push(tokio::spawn(async move { consumer.run(cancel).await }));
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }
    cancel.cancel();

    // Drain: in-flight jobs finish, no new pops.
    for handle in consumer_handles {
        let _ = handle.await;
    }
    let _ = heartbeat_handle.await;

    tracing::info!("Worker stopped");
}

/// Initialize crash reporting when a DSN is configured.
///
/// Returns the client guard, which must stay alive for the process
/// lifetime. Reporting is disabled when `SENTRY_WORKER_DSN` is absent or
/// empty.
fn init_crash_reporting() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_WORKER_DSN")
        .ok()
        .filter(|dsn| !dsn.is_empty());

    let Some(dsn) = dsn else {
        tracing::info!("Crash reporting disabled (no DSN configured)");
        return None;
    };

    tracing::info!("Crash reporting enabled");
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
