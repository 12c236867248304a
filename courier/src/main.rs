use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use courier::api::{self, AppState};
use courier::callback::CallbackService;
use courier::config::AppConfig;
use courier::credentials::StsCredentialsBroker;
use courier::ingest::Ingestor;
use courier::storage::{ElevatedS3Store, S3StagingStore};
use courier::transcribe::{AwsTranscriptionClient, Transcriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    courier::logging::init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let staging = Arc::new(S3StagingStore::from_aws(&aws));
    let broker = Arc::new(StsCredentialsBroker::from_aws(
        &aws,
        config.s3_destination_writer_role.clone(),
    ));
    let writer = Arc::new(ElevatedS3Store::new(aws.clone()));

    let state = AppState {
        callbacks: Arc::new(CallbackService::from_aws(&aws, &config)),
        ingestor: Arc::new(Ingestor::new(
            staging.clone(),
            config.artifact_bucket_name.clone(),
        )),
        transcriber: Arc::new(Transcriber::new(
            Arc::new(AwsTranscriptionClient::from_aws(&aws)),
            staging,
            broker,
            writer,
            config.transcribe_job_name_prefix.clone(),
        )),
    };

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Listening on {}", config.bind_addr);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
