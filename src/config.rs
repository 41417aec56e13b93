// Application configuration, loaded from environment variables and CLI flags.

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (SQLite connection string).
    pub database_url: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Base URL of the remote wargame platform API.
    pub remote_base_url: String,
    /// API key sent to the remote platform, if it requires one.
    pub remote_api_key: Option<String>,
    /// Seconds between catalog synchronization runs.
    pub catalog_poll_secs: u64,
    /// Seconds between per-user solve reconciliation passes.
    pub solve_poll_secs: u64,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATABASE_URL` - SQLite connection string (default: `sqlite:solvetrack.db?mode=rwc`)
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `REMOTE_BASE_URL` - wargame platform API base URL
    /// - `REMOTE_API_KEY` - optional API key for the platform
    /// - `CATALOG_POLL_SECS` - catalog sync interval (default: 3600)
    /// - `SOLVE_POLL_SECS` - solve reconciliation interval (default: 300)
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:solvetrack.db?mode=rwc".to_string());

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(&args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| std::env::var("PORT").ok().and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let remote_base_url = std::env::var("REMOTE_BASE_URL")
            .unwrap_or_else(|_| "https://api.www.root-me.org".to_string());

        let remote_api_key = std::env::var("REMOTE_API_KEY").ok();

        let catalog_poll_secs = std::env::var("CATALOG_POLL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3600);

        let solve_poll_secs = std::env::var("SOLVE_POLL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300);

        Config {
            database_url,
            port,
            remote_base_url,
            remote_api_key,
            catalog_poll_secs,
            solve_poll_secs,
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cli_value() {
        let args: Vec<String> = vec!["prog".into(), "--port".into(), "8080".into()];
        assert_eq!(
            Config::parse_cli_value(&args, "--port"),
            Some("8080".to_string())
        );
        assert_eq!(Config::parse_cli_value(&args, "--missing"), None);
    }
}
