//! Process configuration (§6), loaded by layering built-in defaults over
//! an optional `config/default.toml` over `SECCHIWARE_*` environment
//! variables, matching the teacher's `dotenvy::dotenv().ok()` bootstrap
//! idiom for local development.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub listen_addr: String,
    pub listen_port: u16,

    pub redis_url: String,

    pub node_secret: String,
    pub client_secret: String,

    pub tests_dir: String,
    pub database_path: String,
}

impl Config {
    pub fn load() -> Result<Self, anyhow::Error> {
        let settings = config::Config::builder()
            .set_default("listen_addr", "0.0.0.0")?
            .set_default("listen_port", 8080)?
            .set_default("redis_url", "redis://127.0.0.1:6379")?
            .set_default("tests_dir", "data/tests")?
            .set_default("database_path", "data/coordinator.db")?
            .set_default("node_secret", "")?
            .set_default("client_secret", "")?
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("SECCHIWARE"))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), anyhow::Error> {
        if self.node_secret.is_empty() {
            anyhow::bail!("SECCHIWARE_NODE_SECRET must be set");
        }
        if self.client_secret.is_empty() {
            anyhow::bail!("SECCHIWARE_CLIENT_SECRET must be set");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }
}
