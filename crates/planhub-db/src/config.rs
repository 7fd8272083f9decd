use std::env;

/// Database configuration.
///
/// Reads from the `PLANHUB_DATABASE_URL` environment variable, falling back
/// to `postgresql://localhost:5432/planhub` when unset.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
}

impl DbConfig {
    /// The default connection URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/planhub";

    /// Pool size used unless overridden.
    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

    /// Build a config from the environment.
    pub fn from_env() -> Self {
        let database_url = env::var("PLANHUB_DATABASE_URL")
            .unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        Self::new(database_url)
    }

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Extract the database name from the URL.
    ///
    /// Returns `None` if the URL has no path component. Query parameters
    /// (`?sslmode=...`) are not part of the name.
    pub fn database_name(&self) -> Option<&str> {
        self.database_url
            .split('?')
            .next()
            .and_then(|base| base.rsplit('/').next())
            .filter(|s| !s.is_empty() && !s.contains(':'))
    }

    /// Return a URL pointing at the `postgres` maintenance database on the
    /// same host. Used to issue `CREATE DATABASE` when the target DB does not
    /// yet exist.
    pub fn maintenance_url(&self) -> String {
        let (base, query) = match self.database_url.split_once('?') {
            Some((b, q)) => (b, Some(q)),
            None => (self.database_url.as_str(), None),
        };
        let mut url = match base.rfind('/') {
            Some(pos) => format!("{}/postgres", &base[..pos]),
            None => base.to_owned(),
        };
        if let Some(q) = query {
            url.push('?');
            url.push_str(q);
        }
        url
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_url() {
        let cfg = DbConfig::new(DbConfig::DEFAULT_URL);
        assert_eq!(cfg.database_url, "postgresql://localhost:5432/planhub");
        assert_eq!(cfg.max_connections, DbConfig::DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn database_name_extraction() {
        let cfg = DbConfig::new("postgresql://localhost:5432/mydb");
        assert_eq!(cfg.database_name(), Some("mydb"));
    }

    #[test]
    fn database_name_ignores_query_string() {
        let cfg = DbConfig::new("postgresql://localhost:5432/mydb?sslmode=disable");
        assert_eq!(cfg.database_name(), Some("mydb"));
    }

    #[test]
    fn database_name_missing() {
        let cfg = DbConfig::new("postgresql://localhost:5432/");
        assert_eq!(cfg.database_name(), None);
    }

    #[test]
    fn maintenance_url_replaces_db() {
        let cfg = DbConfig::new("postgresql://localhost:5432/planhub");
        assert_eq!(cfg.maintenance_url(), "postgresql://localhost:5432/postgres");
    }

    #[test]
    fn maintenance_url_keeps_query_string() {
        let cfg = DbConfig::new("postgresql://db:5432/planhub?sslmode=require");
        assert_eq!(
            cfg.maintenance_url(),
            "postgresql://db:5432/postgres?sslmode=require"
        );
    }
}
