//! Subcommand implementations

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::ArgMatches;
use std::path::Path;
use std::sync::Arc;
use vaultshift_core::{
    ArchiveOutcome, IntegrationConfig, IntegrationController, IntegrationError,
    MigrationAssessment,
};
use vaultshift_model::{LegacyRecord, Transaction};
use vaultshift_store::{json_stores, KeyValueStore, LegacyStore, PrivacyStore};

pub(crate) fn status(controller: &IntegrationController, json: bool) -> anyhow::Result<()> {
    let snapshot = controller.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("Mode:   {}", snapshot.mode);
    println!("Status: {}", snapshot.status);
    if let Some(progress) = &snapshot.progress {
        println!(
            "Progress: {} ({:.0}%)",
            progress.step,
            progress.progress * 100.0
        );
    }
    if let Some(key) = &snapshot.archive_key {
        println!("Archive: {key}");
    }
    if let Some(error) = &snapshot.last_error {
        println!("Last error: {error}");
    }
    Ok(())
}

pub(crate) async fn import(
    kv: Arc<dyn KeyValueStore>,
    config: &IntegrationConfig,
    file: &Path,
    replace: bool,
) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let record: LegacyRecord = serde_json::from_str(&text)
        .with_context(|| format!("parsing legacy record from {}", file.display()))?;

    let (legacy, privacy) = json_stores(kv, &config.keys);
    if privacy.exists().await? {
        bail!("privacy-first data already present; roll back before importing");
    }
    if !replace && legacy.load().await?.is_some() {
        bail!("a legacy record already exists; pass --replace to overwrite it");
    }
    legacy.save(&record).await?;

    tracing::info!(
        transactions = record.transactions.len(),
        accounts = record.accounts.len(),
        "imported legacy record"
    );
    println!(
        "Imported legacy record for {} ({} transactions, {} accounts)",
        record.name,
        record.transactions.len(),
        record.accounts.len()
    );
    Ok(())
}

fn print_assessment(assessment: &MigrationAssessment) {
    if assessment.issues.is_empty() {
        println!("No findings.");
    }
    for issue in &assessment.issues {
        println!("  [{:?}] {:?}: {}", issue.severity, issue.code, issue.description);
    }
}

pub(crate) async fn assess(controller: &IntegrationController) -> anyhow::Result<()> {
    let assessment = controller.assess_migration_readiness().await?;
    print_assessment(&assessment);
    println!(
        "Status: {} (migration {})",
        controller.status(),
        if assessment.recommended {
            "recommended"
        } else {
            "not recommended"
        }
    );
    Ok(())
}

pub(crate) async fn migrate(controller: &IntegrationController) -> anyhow::Result<()> {
    let report = match controller.assess_and_migrate().await {
        Ok(report) => report,
        Err(e @ IntegrationError::ValidationBlocked { .. }) => {
            print_assessment(&controller.migration_assessment());
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Migration {} completed", report.id);
    println!("  Balance:      {:.2}", report.balance);
    println!("  Transactions: {}", report.transaction_count);
    println!("  Accounts:     {}", report.account_count);
    match &report.archive {
        ArchiveOutcome::Archived { key } => println!("  Archive:      {key}"),
        ArchiveOutcome::Failed { reason } => {
            eprintln!("warning: legacy snapshot was not archived: {reason}");
        }
    }
    Ok(())
}

pub(crate) async fn rollback(controller: &IntegrationController) -> anyhow::Result<()> {
    let record = controller.rollback_to_legacy().await?;
    println!(
        "Rolled back to legacy: {} transactions, balance {:.2}",
        record.transactions.len(),
        record.balance
    );
    Ok(())
}

pub(crate) async fn balance(controller: &IntegrationController) -> anyhow::Result<()> {
    println!("{:.2}", controller.total_balance().await?);
    Ok(())
}

pub(crate) async fn transactions(
    controller: &IntegrationController,
    json: bool,
) -> anyhow::Result<()> {
    let transactions = controller.transactions().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&transactions)?);
        return Ok(());
    }
    for tx in &transactions {
        println!(
            "{}  {:>12.2}  {:<10}  {}  {}",
            tx.date.format("%Y-%m-%d"),
            tx.amount,
            tx.account_id.as_deref().unwrap_or("-"),
            tx.id,
            tx.description
        );
    }
    Ok(())
}

pub(crate) async fn accounts(controller: &IntegrationController) -> anyhow::Result<()> {
    for account in controller.accounts().await? {
        println!(
            "{:<12} {:<20} {:>12.2}",
            account.id, account.name, account.balance
        );
    }
    Ok(())
}

pub(crate) async fn add(controller: &IntegrationController, args: &ArgMatches) -> anyhow::Result<()> {
    let id = args.get_one::<String>("id").context("missing --id")?;
    let amount = *args.get_one::<f64>("amount").context("missing --amount")?;
    let description = args
        .get_one::<String>("description")
        .context("missing --description")?;

    let date = match args.get_one::<String>("date") {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid --date {raw}"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let mut tx = Transaction::new(id.clone(), amount, description.clone()).on(date);
    if let Some(account) = args.get_one::<String>("account") {
        tx = tx.in_account(account.clone());
    }
    if let Some(category) = args.get_one::<String>("category") {
        tx = tx.with_category(category.clone());
    }

    controller.add_transaction(tx).await?;
    println!("Added {id}; balance now {:.2}", controller.total_balance().await?);
    Ok(())
}

pub(crate) async fn remove(controller: &IntegrationController, id: &str) -> anyhow::Result<()> {
    let removed = controller.remove_transaction(id).await?;
    println!(
        "Removed {} ({:.2}); balance now {:.2}",
        removed.id,
        removed.amount,
        controller.total_balance().await?
    );
    Ok(())
}

pub(crate) async fn archives(controller: &IntegrationController) -> anyhow::Result<()> {
    let keys = controller.archive().list().await?;
    if keys.is_empty() {
        println!("No archived snapshots.");
    }
    for key in keys {
        println!("{key}");
    }
    Ok(())
}
