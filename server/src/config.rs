//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use hearsay_audio::AudioProfil;
use hearsay_core::ScopeId;
use hearsay_session::SessionKonfig;

/// Vollstaendige Relay-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RelayKonfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Audio-Einstellungen der Misch-Pipeline
    pub audio: AudioEinstellungen,
    /// Stream-Einstellungen (Transport-Senke)
    pub stream: StreamEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Hearsay Relay".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer den HTTP-Server
    pub bind_adresse: String,
    /// Port fuer HTTP-Streaming und Diagnose
    pub http_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            http_port: 8080,
        }
    }
}

/// Audio-Einstellungen der Misch-Pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    /// Opus-Bitrate der kodierten Ausgabe in kbit/s
    pub bitrate_kbps: u16,
    /// Frische-Fenster des Mischwerks in ms
    pub frische_fenster_ms: u64,
    /// Stille-Dauer in ms, nach der sich eine Sprecher-Route schliesst
    pub stille_timeout_ms: u64,
    /// Hartes Zeitlimit fuer Verbindungs-Bereitschaft in ms
    pub verbindungs_timeout_ms: u64,
}

impl Default for AudioEinstellungen {
    fn default() -> Self {
        Self {
            bitrate_kbps: 64,
            frische_fenster_ms: 100,
            stille_timeout_ms: 100,
            verbindungs_timeout_ms: 5000,
        }
    }
}

/// Stream-Einstellungen der Transport-Senke
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamEinstellungen {
    /// Oeffentliche Basis-URL fuer die Stream-URL-Ableitung
    pub basis_url: String,
    /// Queue-Kapazitaet pro Hoerer (Datenbloecke)
    pub hoerer_queue_groesse: usize,
    /// Wiedergabe-Lautstaerke im Relay-Modus (0.0–1.0)
    pub lautstaerke: f32,
}

impl Default for StreamEinstellungen {
    fn default() -> Self {
        Self {
            basis_url: "http://localhost:8080".into(),
            hoerer_queue_groesse: 256,
            lautstaerke: 1.0,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl RelayKonfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let konfig: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(konfig)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer HTTP zurueck
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.http_port)
    }

    /// Leitet die Session-Konfiguration fuer den Verwalter ab
    pub fn session_konfig(&self) -> SessionKonfig {
        let profil = AudioProfil {
            bitrate_kbps: self.audio.bitrate_kbps,
            ..AudioProfil::default()
        };

        SessionKonfig {
            profil,
            frische_fenster: Duration::from_millis(self.audio.frische_fenster_ms),
            stille_timeout: Duration::from_millis(self.audio.stille_timeout_ms),
            verbindungs_timeout: Duration::from_millis(self.audio.verbindungs_timeout_ms),
            lautstaerke: self.stream.lautstaerke,
            ..SessionKonfig::default()
        }
    }

    /// Oeffentliche URL des Opus-Streams einer Session
    pub fn stream_url(&self, scope: ScopeId) -> String {
        hearsay_stream::stream_url(&self.stream.basis_url, scope)
    }

    /// Oeffentliche URL des PCM-Streams einer Session
    pub fn pcm_stream_url(&self, scope: ScopeId) -> String {
        hearsay_stream::pcm_stream_url(&self.stream.basis_url, scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_konfig_ist_valide() {
        let cfg = RelayKonfig::default();
        assert_eq!(cfg.netzwerk.http_port, 8080);
        assert_eq!(cfg.audio.bitrate_kbps, 64);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.session_konfig().profil.validieren().is_ok());
    }

    #[test]
    fn bind_adresse() {
        let cfg = RelayKonfig::default();
        assert_eq!(cfg.http_bind_adresse(), "0.0.0.0:8080");
    }

    #[test]
    fn konfig_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Mein Relay"

            [netzwerk]
            http_port = 9000

            [audio]
            bitrate_kbps = 96
        "#;
        let cfg: RelayKonfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Mein Relay");
        assert_eq!(cfg.netzwerk.http_port, 9000);
        assert_eq!(cfg.audio.bitrate_kbps, 96);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.audio.stille_timeout_ms, 100);
        assert_eq!(cfg.stream.basis_url, "http://localhost:8080");
    }

    #[test]
    fn session_konfig_ableitung() {
        let mut cfg = RelayKonfig::default();
        cfg.audio.frische_fenster_ms = 80;
        cfg.audio.verbindungs_timeout_ms = 2000;

        let session = cfg.session_konfig();
        assert_eq!(session.frische_fenster, Duration::from_millis(80));
        assert_eq!(session.verbindungs_timeout, Duration::from_secs(2));
    }

    #[test]
    fn stream_urls() {
        let cfg = RelayKonfig::default();
        assert_eq!(cfg.stream_url(ScopeId(5)), "http://localhost:8080/stream/5");
        assert_eq!(
            cfg.pcm_stream_url(ScopeId(5)),
            "http://localhost:8080/stream/5/pcm"
        );
    }
}
