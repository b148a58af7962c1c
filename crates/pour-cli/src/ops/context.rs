//! Shared operation context.
//!
//! Groups the state every operation needs so functions take one argument
//! instead of five.

use std::fmt;

use anyhow::Context as _;
use pour_core::Layout;
use pour_core::Reporter;
use pour_core::config::{self, Config};
use pour_core::deps::DependencyProbe;

use crate::store::StateDb;

pub struct Context<R: Reporter> {
    pub db: StateDb,
    pub layout: Layout,
    pub client: reqwest::Client,
    pub probe: DependencyProbe,
    pub reporter: R,
}

impl<R: Reporter> fmt::Debug for Context<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl<R: Reporter> Context<R> {
    pub fn new(db: StateDb, layout: Layout, client: reqwest::Client, reporter: R) -> Self {
        Self {
            db,
            layout,
            client,
            probe: DependencyProbe::from_env(),
            reporter,
        }
    }

    /// Resolve configuration from the environment and open the state database.
    pub fn from_env(reporter: R) -> anyhow::Result<Self> {
        let (config, layout) = config::load_from_env()?;
        let db = StateDb::open(&layout).context("Failed to open state database")?;
        let client = http_client(&config)?;
        Ok(Self::new(db, layout, client, reporter))
    }
}

/// Build the HTTP client with the configured timeout and user agent.
pub fn http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.network.user_agent())
        .timeout(config.network.timeout())
        .build()
        .context("Failed to build HTTP client")
}
