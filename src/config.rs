use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub runtime_env: RuntimeEnv,
    pub refresh: RefreshIntervals,
}

/// Per-cache reload intervals. Each refresh loop sleeps its own interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshIntervals {
    pub markets: Duration,
    pub perpetual_markets: Duration,
    pub assets: Duration,
    pub liquidity_tiers: Duration,
    pub vaults: Duration,
    pub block_height: Duration,
}

impl Default for RefreshIntervals {
    fn default() -> Self {
        Self {
            markets: Duration::from_millis(5_000),
            perpetual_markets: Duration::from_millis(5_000),
            assets: Duration::from_millis(5_000),
            liquidity_tiers: Duration::from_millis(5_000),
            vaults: Duration::from_millis(5_000),
            block_height: Duration::from_millis(1_000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeEnv {
    Test,
    Development,
    Staging,
    Production,
}

impl RuntimeEnv {
    pub fn is_test(&self) -> bool {
        matches!(self, RuntimeEnv::Test)
    }
}

impl fmt::Display for RuntimeEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeEnv::Test => write!(f, "test"),
            RuntimeEnv::Development => write!(f, "development"),
            RuntimeEnv::Staging => write!(f, "staging"),
            RuntimeEnv::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let runtime_env = match env_map
            .get("RUNTIME_ENV")
            .map(|s| s.as_str())
            .unwrap_or("development")
        {
            "test" => RuntimeEnv::Test,
            "development" => RuntimeEnv::Development,
            "staging" => RuntimeEnv::Staging,
            "production" => RuntimeEnv::Production,
            other => {
                return Err(ConfigError::InvalidValue(
                    "RUNTIME_ENV".to_string(),
                    format!(
                        "must be test, development, staging, or production, got {}",
                        other
                    ),
                ))
            }
        };

        let defaults = RefreshIntervals::default();
        let refresh = RefreshIntervals {
            markets: parse_interval(&env_map, "MARKET_REFRESH_MS", defaults.markets)?,
            perpetual_markets: parse_interval(
                &env_map,
                "PERPETUAL_MARKET_REFRESH_MS",
                defaults.perpetual_markets,
            )?,
            assets: parse_interval(&env_map, "ASSET_REFRESH_MS", defaults.assets)?,
            liquidity_tiers: parse_interval(
                &env_map,
                "LIQUIDITY_TIER_REFRESH_MS",
                defaults.liquidity_tiers,
            )?,
            vaults: parse_interval(&env_map, "VAULT_REFRESH_MS", defaults.vaults)?,
            block_height: parse_interval(
                &env_map,
                "BLOCK_HEIGHT_REFRESH_MS",
                defaults.block_height,
            )?,
        };

        Ok(Config {
            database_path,
            runtime_env,
            refresh,
        })
    }
}

fn parse_interval(
    env_map: &HashMap<String, String>,
    key: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let Some(raw) = env_map.get(key) else {
        return Ok(default);
    };
    match raw.parse::<u64>() {
        Ok(ms) if ms > 0 => Ok(Duration::from_millis(ms)),
        _ => Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be a positive number of milliseconds".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.runtime_env, RuntimeEnv::Development);
        assert_eq!(config.refresh, RefreshIntervals::default());
    }

    #[test]
    fn test_runtime_env_parsing() {
        let mut env_map = setup_required_env();
        env_map.insert("RUNTIME_ENV".to_string(), "test".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert!(config.runtime_env.is_test());
    }

    #[test]
    fn test_invalid_runtime_env() {
        let mut env_map = setup_required_env();
        env_map.insert("RUNTIME_ENV".to_string(), "invalid".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "RUNTIME_ENV"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_refresh_interval_override() {
        let mut env_map = setup_required_env();
        env_map.insert("BLOCK_HEIGHT_REFRESH_MS".to_string(), "250".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.refresh.block_height, Duration::from_millis(250));
        assert_eq!(config.refresh.markets, Duration::from_millis(5_000));
    }

    #[test]
    fn test_invalid_refresh_interval() {
        for bad in ["0", "soon", "-5"] {
            let mut env_map = setup_required_env();
            env_map.insert("VAULT_REFRESH_MS".to_string(), bad.to_string());
            match Config::from_env_map(env_map) {
                Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "VAULT_REFRESH_MS"),
                _ => panic!("Expected InvalidValue error for {}", bad),
            }
        }
    }
}
