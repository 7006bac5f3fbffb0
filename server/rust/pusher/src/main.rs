use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinError;
use tracing::{info, warn};

use k1s0_messaging::{EventConsumer, KafkaEventConsumer, MessagingError};
use k1s0_pusher::infrastructure::{Config, HttpDeliveryClient};
use k1s0_pusher::usecase::{drain_consumer_errors, RelayMessagesUseCase, RelayStats};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Config
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    let cfg = Config::load(&config_path)?;

    // Logger
    k1s0_telemetry::init_logger(&cfg.log, &cfg.app.environment)?;

    let group_id = cfg.consumer_group_id();
    info!(
        app_name = %cfg.app.name,
        version = %cfg.app.version,
        environment = %cfg.app.environment,
        callback_url = %cfg.callback.url,
        group = %group_id,
        topics = ?cfg.kafka.topics,
        retry_times = cfg.callback.retry_times,
        bypass_failed = cfg.callback.bypass_failed,
        "starting pusher"
    );

    // Kafka consumer: グループに参加できなければ起動しない
    let (consumer, errors) = KafkaEventConsumer::new(
        &cfg.kafka.messaging_config(),
        &cfg.kafka.consumer_config(group_id),
    )?;
    let consumer = Arc::new(consumer);

    let error_drain = tokio::spawn(drain_consumer_errors(errors));

    // Delivery
    let client = Arc::new(HttpDeliveryClient::new(
        cfg.callback.url.clone(),
        cfg.callback.timeout(),
    )?);
    let use_case = RelayMessagesUseCase::new(client, cfg.callback.retry_policy());

    let mut relay = {
        let consumer = consumer.clone();
        tokio::spawn(async move { use_case.run(consumer.as_ref()).await })
    };

    let result = tokio::select! {
        result = &mut relay => finish(result),
        () = shutdown_signal() => {
            consumer.close();
            let grace = Duration::from_secs(cfg.shutdown.grace_period_secs);
            if let Ok(result) = tokio::time::timeout(grace, &mut relay).await {
                finish(result)
            } else {
                // 配送できないメッセージで待機し続けている場合はここに来る
                warn!(
                    grace_period_secs = cfg.shutdown.grace_period_secs,
                    "delivery loop did not stop within grace period, aborting"
                );
                relay.abort();
                Ok(())
            }
        }
    };

    error_drain.abort();
    info!("pusher exited");
    result
}

fn finish(result: Result<Result<RelayStats, MessagingError>, JoinError>) -> anyhow::Result<()> {
    let stats = result??;
    info!(
        received = stats.received,
        delivered = stats.delivered,
        bypassed = stats.bypassed,
        committed = stats.committed,
        commit_failures = stats.commit_failures,
        offset_anomalies = stats.offset_anomalies,
        restart_cycles = stats.restart_cycles,
        "delivery loop finished"
    );
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("shutdown signal received, closing kafka consumer");
}
