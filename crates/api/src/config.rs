use std::str::FromStr;

/// Server configuration loaded from environment variables.
///
/// All fields except the session secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Every store and
    /// network call made while serving a request is bounded by it.
    pub request_timeout_secs: u64,
    /// Time allowed for in-flight event handlers on shutdown (default: `30`).
    pub shutdown_timeout_secs: u64,
    pub session: SessionConfig,
    pub geo: GeoConfig,
}

/// Which session strategy the process runs with. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    /// Opaque id in the cookie, full record in Postgres.
    Database,
    /// Self-contained signed token in the cookie.
    Token,
}

impl FromStr for SessionBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "database" | "db" => Ok(SessionBackend::Database),
            "token" | "jwt" => Ok(SessionBackend::Token),
            other => Err(format!(
                "Unknown session backend '{other}'. Must be one of: database, token"
            )),
        }
    }
}

/// Session and CSRF settings.
#[derive(Clone)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    /// HMAC key for session tokens and CSRF tokens.
    pub secret: String,
    /// Add the `Secure` attribute to every cookie we set.
    pub cookie_secure: bool,
    /// How often expired database sessions are purged.
    pub cleanup_interval_secs: u64,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("backend", &self.backend)
            .field("secret", &"<redacted>")
            .field("cookie_secure", &self.cookie_secure)
            .field("cleanup_interval_secs", &self.cleanup_interval_secs)
            .finish()
    }
}

/// External IP-geolocation settings.
#[derive(Debug, Clone)]
pub struct GeoConfig {
    /// Base URL; the caller IP is appended as a path segment.
    pub lookup_url: String,
    /// How long a resolved address stays fresh in the cache.
    pub cache_ttl_secs: i64,
    /// Timeout for a single lookup request.
    pub timeout_secs: u64,
}

/// Default geo cache lifetime: 10 minutes.
pub const DEFAULT_GEO_CACHE_TTL_SECS: i64 = 600;

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                   |
    /// |--------------------------------|---------------------------|
    /// | `HOST`                         | `0.0.0.0`                 |
    /// | `PORT`                         | `3000`                    |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173`   |
    /// | `REQUEST_TIMEOUT_SECS`         | `30`                      |
    /// | `SHUTDOWN_TIMEOUT_SECS`        | `30`                      |
    /// | `SESSION_BACKEND`              | `database`                |
    /// | `SESSION_SECRET`               | **required**              |
    /// | `COOKIE_SECURE`                | `false`                   |
    /// | `SESSION_CLEANUP_INTERVAL_SECS`| `3600`                    |
    /// | `GEO_LOOKUP_URL`               | `http://ip-api.com/json`  |
    /// | `GEO_CACHE_TTL_SECS`           | `600`                     |
    /// | `GEO_TIMEOUT_SECS`             | `3`                       |
    ///
    /// # Panics
    ///
    /// Panics on a missing `SESSION_SECRET` or any unparsable value; a
    /// misconfigured server should not start.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let secret =
            std::env::var("SESSION_SECRET").expect("SESSION_SECRET must be set in the environment");
        assert!(!secret.is_empty(), "SESSION_SECRET must not be empty");

        let session = SessionConfig {
            backend: env_or("SESSION_BACKEND", SessionBackend::Database),
            secret,
            cookie_secure: env_or("COOKIE_SECURE", false),
            cleanup_interval_secs: env_or("SESSION_CLEANUP_INTERVAL_SECS", 3600),
        };

        let geo = GeoConfig {
            lookup_url: std::env::var("GEO_LOOKUP_URL")
                .unwrap_or_else(|_| "http://ip-api.com/json".into()),
            cache_ttl_secs: env_or("GEO_CACHE_TTL_SECS", DEFAULT_GEO_CACHE_TTL_SECS),
            timeout_secs: env_or("GEO_TIMEOUT_SECS", 3),
        };

        Self {
            host,
            port: env_or("PORT", 3000),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            session,
            geo,
        }
    }
}

/// Read and parse `key`, falling back to `default` when it is unset.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_backend_parses_aliases() {
        assert_eq!("database".parse::<SessionBackend>(), Ok(SessionBackend::Database));
        assert_eq!(" DB ".parse::<SessionBackend>(), Ok(SessionBackend::Database));
        assert_eq!("token".parse::<SessionBackend>(), Ok(SessionBackend::Token));
        assert_eq!("jwt".parse::<SessionBackend>(), Ok(SessionBackend::Token));
        assert!("redis".parse::<SessionBackend>().is_err());
    }

    #[test]
    fn session_config_debug_redacts_secret() {
        let config = SessionConfig {
            backend: SessionBackend::Token,
            secret: "super-secret-value".into(),
            cookie_secure: true,
            cleanup_interval_secs: 60,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret-value"));
        assert!(rendered.contains("<redacted>"));
    }
}
