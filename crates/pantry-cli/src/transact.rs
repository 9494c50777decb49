//! Operator commands that talk to Transact directly, bypassing the server.

use pantry_core::TransactConfig;
use pantry_transact::{
    report_names, PartialProductSource, SessionManager, SessionSettings, TransactProvider,
};

pub(crate) async fn run_login(config: &TransactConfig) -> anyhow::Result<()> {
    let session = SessionManager::new(SessionSettings::from_config(config))?;
    let version = session.reload_session().await?;
    println!("logged in to tenant '{}' (client version {version})", config.tenant);
    Ok(())
}

pub(crate) async fn run_reports(config: &TransactConfig) -> anyhow::Result<()> {
    let session = SessionManager::new(SessionSettings::from_config(config))?;
    session.reload_session().await?;

    let favorites = session.list_favorite_reports().await?;
    let names = report_names(&favorites);
    if names.is_empty() {
        println!("no favorite reports found");
        return Ok(());
    }
    for name in names {
        let marker = if name == config.report_name { " (configured)" } else { "" };
        println!("{name}{marker}");
    }
    Ok(())
}

pub(crate) async fn run_fetch(config: &TransactConfig, location: Option<&str>) -> anyhow::Result<()> {
    let provider = TransactProvider::from_config(config)?;
    provider.session().reload_session().await?;
    let summary = provider.fetch_once().await?;
    tracing::info!(
        rows_scanned = summary.rows_scanned,
        rows_accepted = summary.rows_accepted,
        "fetched Transact inventory"
    );

    if let Some(location) = location {
        let products = provider.list_products(location)?;
        println!("{}", serde_json::to_string_pretty(&products)?);
        return Ok(());
    }

    for location in provider.list_locations()? {
        let count = provider.list_products(&location)?.len();
        println!("{location}\t{count} products");
    }
    println!(
        "{} locations, {} products",
        summary.locations, summary.products
    );
    Ok(())
}
