use anyhow::Context;
use clap::Parser;
use mail_batch::utils::error::ErrorSeverity;
use mail_batch::utils::{logger, validation::Validate};
use mail_batch::{
    AppConfig, CheckError, CheckService, CliConfig, EventPayload, FormatChecker, JobId,
    LocalStorage, RetryingChecker, Storage, ValidationStatus,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("failed to load config file '{}'", path))?,
        None => AppConfig::default(),
    };
    cli.apply_overrides(&mut config);

    // 初始化日誌
    if config.json_logs() {
        logger::init_json_logger(config.logging.verbose);
    } else {
        logger::init_cli_logger(config.logging.verbose);
    }
    tracing::debug!("Effective config: {:?}", config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    match run(&cli, &config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::error!(
                "❌ Validation run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

async fn run(cli: &CliConfig, config: &AppConfig) -> Result<(), CheckError> {
    let checker = RetryingChecker::new(
        FormatChecker::new().with_allowed_domains(&config.checker.allowed_domains),
        config.retry_policy(),
    );
    let service = CheckService::from_config(config, Arc::new(checker))?;
    let job_id = JobId::new(cli.job_id.clone());

    let raw = tokio::fs::read(&cli.input).await?;
    let mut events = service.subscribe(&job_id).await;
    let receipt = service.upload(job_id.clone(), &raw).await?;
    println!(
        "📥 {} addresses queued ({} duplicates removed)",
        receipt.total_emails, receipt.duplicates_removed
    );

    // Ctrl-C 視為取消
    let cancel_service = service.clone();
    let cancel_job = job_id.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling job {}", cancel_job);
            if let Err(e) = cancel_service.cancel(&cancel_job).await {
                tracing::warn!("Cancel failed: {}", e);
            }
        }
    });

    while let Some(event) = events.recv().await {
        match event.payload {
            EventPayload::Result(record) => tracing::info!(
                "{} -> {} ({})",
                record.address,
                record.outcome.status,
                record.outcome.message
            ),
            EventPayload::Progress(progress) => {
                tracing::debug!("Progress {}/{}", progress.current, progress.total)
            }
            EventPayload::ProcessingComplete(done) => {
                let aggregate = done.aggregate;
                println!(
                    "✅ Job {}: {} processed, {} valid, {} bounced, {} error",
                    done.final_status,
                    aggregate.total(),
                    aggregate.valid(),
                    aggregate.bounced(),
                    aggregate.error()
                );
            }
        }
    }
    if events.missed() > 0 {
        tracing::warn!("Log output skipped {} events", events.missed());
    }

    let snapshot = service.wait(&job_id).await?;
    let storage = LocalStorage::new(config.export.output_path.clone());
    for category in ValidationStatus::ALL {
        if snapshot.aggregate.of(category) == 0 {
            continue;
        }
        let file = service.export(&job_id, category.as_str()).await?;
        let path = storage
            .write_file(&format!("{}/{}", job_id, file.file_name), &file.body)
            .await?;
        println!("📁 {} results saved to: {}", category, path);
    }

    Ok(())
}
