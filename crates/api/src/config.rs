use relax_materials::client::DEFAULT_BASE_URL;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). Creating a job waits
    /// on the structure source, so keep this above its typical latency.
    pub request_timeout_secs: u64,
    /// Materials Project key used when a request carries none.
    pub mp_api_key: Option<String>,
    /// Materials Project API root.
    pub mp_api_url: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                            |
    /// |------------------------|------------------------------------|
    /// | `HOST`                 | `0.0.0.0`                          |
    /// | `PORT`                 | `8000`                             |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`            |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                               |
    /// | `MP_API_KEY`           | unset                              |
    /// | `MP_API_URL`           | `https://api.materialsproject.org` |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let mp_api_key = std::env::var("MP_API_KEY")
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());

        let mp_api_url = std::env::var("MP_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            mp_api_key,
            mp_api_url,
        }
    }
}
