use serde::Deserialize;

pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_DATABASE_URL: &str = "sqlite://coupons.db";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::from_source(config::Environment::default())
    }

    fn from_source(env: config::Environment) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .set_default("server_port", DEFAULT_SERVER_PORT)?
            .set_default("database_url", DEFAULT_DATABASE_URL)?
            .add_source(env)
            .build()?;
        config.try_deserialize()
    }
}
