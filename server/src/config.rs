//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen und danach durch
//! Umgebungsvariablen ueberschrieben. Alle Felder haben sinnvolle
//! Standardwerte, sodass der Server ohne Konfigurationsdatei lauffaehig ist.

use std::{net::IpAddr, str::FromStr};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use zugang_auth::{AuthKonfig, HashKonfig, PasswortRichtlinie, RateLimitKonfig};
use zugang_db::DatabaseConfig;

/// Nur fuer lokale Entwicklung; beim Start wird davor gewarnt
pub const ENTWICKLUNGS_SECRET: &str = "zugang-entwicklung-nicht-produktiv-verwenden";

/// Obergrenze fuer Token-Lebensdauern: zehn Jahre
pub const MAX_TTL_SEKUNDEN: i64 = 10 * 365 * 24 * 60 * 60;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Datenbank-Einstellungen
    pub datenbank: DatenbankEinstellungen,
    /// Redis fuer gemeinsame Rate-Limit-Zaehler (optional)
    pub redis: RedisEinstellungen,
    /// Tokens, Hashing und Passwort-Richtlinie
    pub auth: AuthEinstellungen,
    pub rate_limit: RateLimitEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    /// Port fuer die REST-API
    pub port: u16,
    /// Gegenstellen, deren `X-Forwarded-For` fuer die Client-IP gilt.
    /// Leer: es zaehlt immer die Adresse der Verbindung.
    pub vertrauenswuerdige_proxies: Vec<IpAddr>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 8080,
            vertrauenswuerdige_proxies: Vec::new(),
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    pub acquire_timeout_sek: u64,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        Self {
            url: "sqlite://zugang.db".into(),
            max_verbindungen: 5,
            acquire_timeout_sek: 5,
        }
    }
}

/// Redis-Einstellungen; ohne URL zaehlt jeder Prozess fuer sich
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisEinstellungen {
    pub url: Option<String>,
}

/// Auth-Einstellungen
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEinstellungen {
    /// HMAC-Schluessel fuer Access-Tokens
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub access_ttl_sek: i64,
    pub refresh_ttl_sek: i64,
    /// Argon2id-Iterationen
    pub hash_kosten: u32,
    pub hash_speicher_kib: u32,
    pub hash_parallelismus: u32,
    pub passwort_min_laenge: usize,
    pub passwort_grossbuchstabe: bool,
    pub passwort_kleinbuchstabe: bool,
    pub passwort_ziffer: bool,
    pub passwort_sonderzeichen: bool,
}

impl std::fmt::Debug for AuthEinstellungen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthEinstellungen")
            .field("jwt_secret", &"[verborgen]")
            .field("access_ttl_sek", &self.access_ttl_sek)
            .field("refresh_ttl_sek", &self.refresh_ttl_sek)
            .field("hash_kosten", &self.hash_kosten)
            .field("hash_speicher_kib", &self.hash_speicher_kib)
            .field("hash_parallelismus", &self.hash_parallelismus)
            .field("passwort_min_laenge", &self.passwort_min_laenge)
            .finish_non_exhaustive()
    }
}

impl Default for AuthEinstellungen {
    fn default() -> Self {
        let hash = HashKonfig::default();
        let richtlinie = PasswortRichtlinie::default();
        Self {
            jwt_secret: ENTWICKLUNGS_SECRET.into(),
            access_ttl_sek: zugang_auth::konfig::ACCESS_LEBENSDAUER_SEKUNDEN,
            refresh_ttl_sek: zugang_auth::konfig::REFRESH_LEBENSDAUER_SEKUNDEN,
            hash_kosten: hash.kosten,
            hash_speicher_kib: hash.speicher_kib,
            hash_parallelismus: hash.parallelismus,
            passwort_min_laenge: richtlinie.min_laenge,
            passwort_grossbuchstabe: richtlinie.grossbuchstabe,
            passwort_kleinbuchstabe: richtlinie.kleinbuchstabe,
            passwort_ziffer: richtlinie.ziffer,
            passwort_sonderzeichen: richtlinie.sonderzeichen,
        }
    }
}

/// Rate-Limit-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitEinstellungen {
    pub anfragen_pro_fenster: u64,
    pub fenster_sek: u64,
}

impl Default for RateLimitEinstellungen {
    fn default() -> Self {
        Self {
            anfragen_pro_fenster: 100,
            fenster_sek: 60,
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

/// Liest eine Umgebungsvariable; ein nicht parsebarer Wert ist ein Fehler
fn umgebung<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(wert) => wert
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Umgebungsvariable {name}='{wert}' ungueltig: {e}")),
        Err(_) => Ok(None),
    }
}

/// Prueft eine Token-Lebensdauer in Sekunden auf (0, MAX_TTL_SEKUNDEN]
fn lebensdauer(feld: &str, sekunden: i64) -> anyhow::Result<chrono::Duration> {
    anyhow::ensure!(sekunden > 0, "{feld} muss positiv sein");
    anyhow::ensure!(
        sekunden <= MAX_TTL_SEKUNDEN,
        "{feld} darf hoechstens {MAX_TTL_SEKUNDEN} Sekunden betragen"
    );
    chrono::Duration::try_seconds(sekunden)
        .ok_or_else(|| anyhow::anyhow!("{feld} ausserhalb des darstellbaren Bereichs"))
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
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

    /// Laedt die Datei und wendet danach die Umgebungsvariablen an
    pub fn laden_mit_umgebung(pfad: &str) -> anyhow::Result<Self> {
        let mut config = Self::laden(pfad)?;
        config.umgebung_anwenden()?;
        Ok(config)
    }

    /// Ueberschreibt Werte aus `ZUGANG_*`-Umgebungsvariablen
    pub fn umgebung_anwenden(&mut self) -> anyhow::Result<()> {
        if let Some(v) = umgebung::<String>("ZUGANG_JWT_SECRET")? {
            self.auth.jwt_secret = v;
        }
        if let Some(v) = umgebung("ZUGANG_ACCESS_TTL_SEK")? {
            self.auth.access_ttl_sek = v;
        }
        if let Some(v) = umgebung("ZUGANG_REFRESH_TTL_SEK")? {
            self.auth.refresh_ttl_sek = v;
        }
        if let Some(v) = umgebung("ZUGANG_HASH_KOSTEN")? {
            self.auth.hash_kosten = v;
        }
        if let Some(v) = umgebung("ZUGANG_RATE_LIMIT_PRO_FENSTER")? {
            self.rate_limit.anfragen_pro_fenster = v;
        }
        if let Some(v) = umgebung("ZUGANG_DATABASE_URL")? {
            self.datenbank.url = v;
        }
        if let Some(v) = umgebung::<String>("ZUGANG_REDIS_URL")? {
            self.redis.url = Some(v).filter(|u| !u.is_empty());
        }
        if let Some(v) = umgebung("ZUGANG_PORT")? {
            self.netzwerk.port = v;
        }
        if let Some(v) = umgebung::<String>("ZUGANG_TRUSTED_PROXIES")? {
            self.netzwerk.vertrauenswuerdige_proxies = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<IpAddr>().map_err(|e| {
                        anyhow::anyhow!("ZUGANG_TRUSTED_PROXIES: '{s}' ist keine IP-Adresse: {e}")
                    })
                })
                .collect::<anyhow::Result<_>>()?;
        }
        if let Some(v) = umgebung("ZUGANG_LOG_LEVEL")? {
            self.logging.level = v;
        }
        if let Some(v) = umgebung("ZUGANG_LOG_FORMAT")? {
            self.logging.format = v;
        }
        Ok(())
    }

    /// Gibt die Bind-Adresse fuer die REST-API zurueck
    pub fn bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port)
    }

    pub fn datenbank_konfig(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.datenbank.url.clone(),
            max_verbindungen: self.datenbank.max_verbindungen,
            acquire_timeout_sek: self.datenbank.acquire_timeout_sek,
            ..DatabaseConfig::default()
        }
    }

    /// Baut die Auth-Konfiguration; ein leerer Schluessel wird abgelehnt
    pub fn auth_konfig(&self) -> anyhow::Result<AuthKonfig> {
        let a = &self.auth;
        if a.jwt_secret.trim().is_empty() {
            anyhow::bail!("auth.jwt_secret darf nicht leer sein");
        }
        let mut konfig = AuthKonfig::neu(a.jwt_secret.clone());
        konfig.access_lebensdauer = lebensdauer("auth.access_ttl_sek", a.access_ttl_sek)?;
        konfig.refresh_lebensdauer = lebensdauer("auth.refresh_ttl_sek", a.refresh_ttl_sek)?;
        konfig.hash = HashKonfig {
            kosten: a.hash_kosten,
            speicher_kib: a.hash_speicher_kib,
            parallelismus: a.hash_parallelismus,
        };
        konfig.passwort_richtlinie = PasswortRichtlinie {
            min_laenge: a.passwort_min_laenge,
            grossbuchstabe: a.passwort_grossbuchstabe,
            kleinbuchstabe: a.passwort_kleinbuchstabe,
            ziffer: a.passwort_ziffer,
            sonderzeichen: a.passwort_sonderzeichen,
        };
        Ok(konfig)
    }

    pub fn rate_limit_konfig(&self) -> anyhow::Result<RateLimitKonfig> {
        anyhow::ensure!(
            self.rate_limit.fenster_sek > 0,
            "rate_limit.fenster_sek muss positiv sein"
        );
        Ok(RateLimitKonfig {
            anfragen_pro_fenster: self.rate_limit.anfragen_pro_fenster,
            fenster: std::time::Duration::from_secs(self.rate_limit.fenster_sek),
        })
    }

    /// Prueft alle abgeleiteten Konfigurationen, bevor etwas gestartet wird
    ///
    /// Warnt einmalig vor dem Entwicklungs-Schluessel.
    pub fn validieren(&self) -> anyhow::Result<()> {
        self.auth_konfig().context("Auth-Konfiguration")?;
        self.rate_limit_konfig().context("Rate-Limit-Konfiguration")?;
        self.bind_adresse()
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.bind_adresse()))?;
        if self.auth.jwt_secret == ENTWICKLUNGS_SECRET {
            tracing::warn!("Entwicklungs-Schluessel fuer Access-Tokens aktiv, ZUGANG_JWT_SECRET setzen");
        }
        Ok(())
    }
}
