mod config;
mod event;
mod handler;
mod server;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mailsort_ai::ModelBundle;
use mailsort_core::email::EMAILS_PATH;
use mailsort_core::{EmailKey, EmailRecord, PathTemplate};
use mailsort_store::{EmailStore, FirestoreClient};
use tracing::info;

use config::{Cli, Command, FirestoreArgs, MAX_INSTANCES, MEMORY_MIB, ModelArgs, TIMEOUT_SECS};
use handler::{ClassificationHandler, Outcome};
use server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    config::init_tracing(cli.log_format);
    info!("mailsort v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve {
            model,
            firestore,
            port,
        } => serve(&model, &firestore, port).await,
        Command::Classify {
            model,
            subject,
            snippet,
        } => classify(&model, EmailRecord::new(subject, snippet)),
        Command::Reclassify {
            model,
            firestore,
            user,
            email,
        } => reclassify(&model, &firestore, EmailKey::new(user, email)).await,
        Command::DeployConfig => {
            println!("trigger:       {EMAILS_PATH} (document created)");
            println!("max_instances: {MAX_INSTANCES}");
            println!("memory:        {MEMORY_MIB}MiB");
            println!("timeout:       {TIMEOUT_SECS}s");
            Ok(())
        }
    }
}

/// Build the handler; a bundle that fails to load leaves it disabled, not the process.
fn build_handler(model: &ModelArgs, store: Arc<dyn EmailStore>) -> ClassificationHandler {
    let bundle = ModelBundle::try_load(&model.model_dir, model.max_length).map(ModelBundle::boxed);
    ClassificationHandler::new(bundle, store)
}

async fn serve(model: &ModelArgs, firestore: &FirestoreArgs, port: u16) -> anyhow::Result<()> {
    let store: Arc<dyn EmailStore> = Arc::new(FirestoreClient::new(firestore.config()?));
    let state = Arc::new(AppState {
        handler: build_handler(model, store),
        template: PathTemplate::parse(EMAILS_PATH)?,
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;
    info!(
        port,
        trigger = EMAILS_PATH,
        model_loaded = state.handler.is_ready(),
        "listening for document events"
    );
    axum::serve(listener, server::router(state)).await?;
    Ok(())
}

fn classify(model: &ModelArgs, record: EmailRecord) -> anyhow::Result<()> {
    let mut bundle = ModelBundle::load(&model.model_dir, model.max_length)?;
    let text = record.classification_text();
    let prediction = bundle.predict(&text)?;

    println!("text:     {text:?}");
    println!("category: {}", prediction.label);
    for (class, logit) in bundle.labels().classes().iter().zip(&prediction.logits) {
        println!("  {logit:>8.4}  {class}");
    }
    Ok(())
}

async fn reclassify(model: &ModelArgs, firestore: &FirestoreArgs, key: EmailKey) -> anyhow::Result<()> {
    let store: Arc<dyn EmailStore> = Arc::new(FirestoreClient::new(firestore.config()?));
    let record = store
        .get(&key)
        .await?
        .with_context(|| format!("{} not found", key.document_path()))?;

    let handler = build_handler(model, store);
    match handler.handle_record(key, &record).await {
        Outcome::Classified { key, label } => {
            println!("{}: {label}", key.document_path());
            Ok(())
        }
        Outcome::ModelUnavailable => anyhow::bail!("model assets failed to load"),
        Outcome::Failed(message) => anyhow::bail!("classification failed: {message}"),
    }
}
