use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub casino_api_url: String,
    pub casino_api_key: String,
    pub webhook_secret: String,
    /// Hard deadline on a single casino transfer call.
    pub transfer_timeout: Duration,
    pub sweep_interval: Duration,
    pub sweep_batch_size: i64,
    /// How long an unpaid deposit stays open before the sweeper expires it.
    pub payment_expiry: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            casino_api_url: env::var("CASINO_API_URL")?,
            casino_api_key: env::var("CASINO_API_KEY")?,
            webhook_secret: env::var("WEBHOOK_SECRET")?,
            transfer_timeout: Duration::from_secs(parse_env_u64("TRANSFER_TIMEOUT_SECONDS", 10)),
            sweep_interval: Duration::from_secs(parse_env_u64("SWEEP_INTERVAL_SECONDS", 5)),
            sweep_batch_size: parse_env_u64("SWEEP_BATCH_SIZE", 25) as i64,
            payment_expiry: Duration::from_secs(
                parse_env_u64("PAYMENT_EXPIRY_MINUTES", 30) * 60,
            ),
        })
    }
}

fn parse_env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}
