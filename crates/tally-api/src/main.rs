//! `tally-api` binary entrypoint.
//!
//! Loads configuration from environment variables and starts the HTTP server.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::Arc;

use anyhow::Result;

use tally_api::config::Config;
use tally_api::server::Server;
use tally_core::observability::{LogFormat, init_logging};
use tally_core::{LedgerStore, MemoryLedger, SheetsLedger};

fn choose_log_format(config: &Config) -> LogFormat {
    if config.debug {
        LogFormat::Pretty
    } else {
        LogFormat::Json
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    init_logging(choose_log_format(&config));

    let store: Arc<dyn LedgerStore> = if let Some(id) = config.ledger.spreadsheet_id.as_deref() {
        let Some(auth) = config.credentials.sheets_auth()? else {
            anyhow::bail!(
                "GOOGLE_CLIENT_EMAIL and GOOGLE_PRIVATE_KEY (or TALLY_SHEETS_BEARER_TOKEN) are required with TALLY_SPREADSHEET_ID"
            );
        };
        tracing::info!(spreadsheet_id = %id, "Using Google Sheets ledger");
        Arc::new(
            SheetsLedger::new(id, auth)?
                .with_base_url(config.ledger.sheets_base_url.clone())
                .with_token_url(config.ledger.token_url.clone()),
        )
    } else {
        if !config.debug {
            anyhow::bail!("TALLY_SPREADSHEET_ID is required when TALLY_DEBUG=false");
        }
        tracing::warn!("TALLY_SPREADSHEET_ID not set; using in-memory ledger (debug only)");
        Arc::new(MemoryLedger::new())
    };

    let server = Server::with_ledger_store(config, store);
    server.serve().await?;
    Ok(())
}
