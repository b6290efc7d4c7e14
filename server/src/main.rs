//! Hearsay Relay – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use std::sync::Arc;

use anyhow::Result;
use hearsay_server::{adapter::UnkonfigurierteQuelle, config::RelayKonfig, logging, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("HEARSAY_CONFIG").unwrap_or_else(|_| "config.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let config = RelayKonfig::laden(&config_pfad)?;

    // Logging initialisieren
    logging::logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Hearsay Relay wird initialisiert"
    );

    // Plattform-Adapter: wird vom einbettenden System ersetzt
    let quelle = Arc::new(UnkonfigurierteQuelle);

    // Server starten
    let server = Server::neu(config, quelle, None);
    server.starten().await?;

    Ok(())
}
