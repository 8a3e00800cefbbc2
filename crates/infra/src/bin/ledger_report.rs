//! Print the ledger's headline balances and the overdue invoice list.
//!
//! Reads `config/ledger.*` and `TAMIRHANE_*` variables; without `database.url` it runs
//! against an empty in-memory ledger seeded with the standard chart.

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use tamirhane_accounting::DateRange;
use tamirhane_infra::{
    InMemoryLedgerStore, LedgerConfig, LedgerReader, LedgerStore, PostgresLedgerStore, PostingEngine,
};
use tamirhane_invoicing::InvoiceStatus;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = LedgerConfig::load().context("loading ledger configuration")?;
    tamirhane_observability::init_with_filter(&config.log.filter);

    let store: Arc<dyn LedgerStore> = match &config.database.url {
        Some(url) => {
            let store = PostgresLedgerStore::connect(url, config.database.max_connections)
                .await
                .context("connecting to postgres")?;
            store.migrate().await.context("running migrations")?;
            Arc::new(store)
        }
        None => {
            info!("no database.url configured, using in-memory ledger");
            Arc::new(InMemoryLedgerStore::new())
        }
    };

    let roles = config.roles()?;
    let engine = PostingEngine::with_roles(store.clone(), roles.clone());
    let added = engine.seed_chart().await.context("seeding chart of accounts")?;
    info!(added, "chart of accounts ready");

    let reader = LedgerReader::with_roles(store, &roles);
    let summary = reader.summary(DateRange::all()).await?;
    info!(
        cash_balance = %summary.cash_balance,
        total_revenue = %summary.total_revenue,
        total_expenses = %summary.total_expenses,
        accounts_receivable = %summary.accounts_receivable,
        net_income = %summary.net_income(),
        entries = summary.entry_count,
        "balance summary"
    );

    let today = Utc::now().date_naive();
    for view in reader.invoices_with_status(InvoiceStatus::Overdue, today).await? {
        info!(
            number = %view.number,
            balance = %view.balance,
            due_date = ?view.due_date,
            "overdue invoice"
        );
    }

    Ok(())
}
