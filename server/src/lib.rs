//! hearsay-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod adapter;
pub mod config;
pub mod logging;

use std::sync::Arc;

use anyhow::Result;

use config::RelayKonfig;
use hearsay_ingest::SprachQuelle;
use hearsay_session::{SessionVerwalter, SprachZiel};
use hearsay_stream::{stream_router, StreamZustand, TapRegister};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: RelayKonfig,
    verwalter: SessionVerwalter,
    zustand: StreamZustand,
}

impl Server {
    /// Erstellt einen neuen Server aus Konfiguration und Capabilities
    ///
    /// `quelle` liefert die Sprecher-Streams, `ziel` ist nur im
    /// Kanal-zu-Kanal-Relay-Modus gesetzt.
    pub fn neu(
        config: RelayKonfig,
        quelle: Arc<dyn SprachQuelle>,
        ziel: Option<Arc<dyn SprachZiel>>,
    ) -> Self {
        let register = TapRegister::neu(config.stream.hoerer_queue_groesse);
        let zustand = StreamZustand::neu(register.clone());
        let verwalter = SessionVerwalter::neu(config.session_konfig(), register, quelle, ziel);

        Self {
            config,
            verwalter,
            zustand,
        }
    }

    /// Gibt den Session-Verwalter zurueck (Schnittstelle der Befehls-Schicht)
    pub fn verwalter(&self) -> &SessionVerwalter {
        &self.verwalter
    }

    /// Startet den HTTP-Server und laeuft bis zum Shutdown-Signal
    ///
    /// Beim Shutdown werden zuerst alle aktiven Sessions in definierter
    /// Reihenfolge gestoppt, dann endet der HTTP-Server.
    pub async fn starten(self) -> Result<()> {
        let bind_adresse = self.config.http_bind_adresse();
        let router = stream_router(self.zustand.clone());

        tracing::info!(
            server_name = %self.config.server.name,
            http = %bind_adresse,
            basis_url = %self.config.stream.basis_url,
            "Server startet"
        );

        let listener = tokio::net::TcpListener::bind(&bind_adresse).await?;

        let verwalter = self.verwalter.clone();
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_abwarten(verwalter))
            .await?;

        tracing::info!("Server beendet");
        Ok(())
    }
}

/// Wartet auf Ctrl-C und stoppt danach alle aktiven Sessions
async fn shutdown_abwarten(verwalter: SessionVerwalter) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(fehler = %e, "Shutdown-Signal nicht verfuegbar");
        return;
    }

    let aktive = verwalter.aktive_sessions();
    tracing::info!(
        sessions = aktive.len(),
        "Shutdown-Signal empfangen, Sessions werden gestoppt"
    );
    verwalter.stoppen_alle();
}
