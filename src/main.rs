use chrono::NaiveDate;
use futures_util::future::join_all;
use tokio::sync::broadcast;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

use crpt_client::api::submitter::DocumentSubmitter;
use crpt_client::config::Config;
use crpt_client::document::model::{Description, Document, Product};

const SUBMISSIONS: usize = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load Config
    let config = Config::load()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting document submitter against {}", config.endpoint);

    let submitter = DocumentSubmitter::from_config(&config)?;
    let document = sample_document()?;

    // Ctrl-C stops callers still waiting for admission
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_signal = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            let _ = shutdown_signal.send(());
        }
    });

    let mut handles = Vec::with_capacity(SUBMISSIONS);
    for i in 0..SUBMISSIONS {
        let submitter = submitter.clone();
        let document = document.clone();
        let mut shutdown = shutdown_tx.subscribe();

        handles.push(tokio::spawn(async move {
            let cancel = async move {
                let _ = shutdown.recv().await;
            };
            match submitter.submit_until(&document, "string", cancel).await {
                Ok(response) => info!("Submission {} finished with status {}", i, response.status),
                Err(e) => error!("Submission {} failed: {}", i, e),
            }
        }));
    }

    join_all(handles).await;
    submitter.stats().log_stats();

    Ok(())
}

fn sample_document() -> anyhow::Result<Document> {
    let date = NaiveDate::from_ymd_opt(2020, 1, 23)
        .ok_or_else(|| anyhow::anyhow!("invalid sample date"))?;

    let product = Product {
        certificate_document: "string".into(),
        certificate_document_date: date,
        certificate_document_number: "string".into(),
        owner_inn: "string".into(),
        producer_inn: "string".into(),
        production_date: date,
        tnved_code: "string".into(),
        uit_code: "string".into(),
        uitu_code: "string".into(),
    };

    Ok(Document::new(
        Description { participant_inn: "string".into() },
        "string".into(),
        "string".into(),
        true,
        "string".into(),
        "string".into(),
        "string".into(),
        date,
        "string".into(),
        vec![product],
        date,
        "string".into(),
    ))
}
