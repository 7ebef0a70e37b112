pub mod cli;
pub mod core;
pub mod engine;
pub mod message;
pub mod providers;
pub mod resolver;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod test_utils;

use crate::core::config::AppConfig;
use crate::core::{Clock, Delivery, Storage, SystemClock, UserId};
use crate::engine::RateEngine;
use crate::providers::telegram::{ConsoleDelivery, TelegramDelivery};
use crate::resolver::GeoResolver;
use crate::scheduler::Scheduler;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    /// Start the notification daemon.
    Run,
    /// Look up rates on demand.
    Rate { currencies: Vec<String> },
    /// Resolve a city to its coordinates and UTC offset.
    Resolve { city: String },
    /// Inspect or change a subscriber's settings.
    User { user_id: UserId, action: UserAction },
}

pub enum UserAction {
    Show,
    City(String),
    Timezone(String),
    Currency(String),
    Time(String),
    Enable,
    Disable,
}

/// Shared collaborators built once per invocation.
pub struct App {
    pub config: AppConfig,
    pub storage: Arc<dyn Storage>,
    pub clock: Arc<dyn Clock>,
    scheduler: Scheduler,
}

impl App {
    pub fn new(config: AppConfig, storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        let delivery = delivery_for(&config);
        Self::with_delivery(config, storage, clock, delivery)
    }

    /// Like `new`, but notifications go to `delivery` instead of the
    /// configured channel.
    pub fn with_delivery(
        config: AppConfig,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        delivery: Arc<dyn Delivery>,
    ) -> Self {
        let rates = RateEngine::from_config(&config, Arc::clone(&storage), Arc::clone(&clock));
        let scheduler = Scheduler::new(
            Arc::clone(&storage),
            Arc::new(rates),
            delivery,
            Arc::clone(&clock),
        );
        Self {
            config,
            storage,
            clock,
            scheduler,
        }
    }

    pub fn open(config_path: Option<&str>) -> Result<Self> {
        let config = match config_path {
            Some(path) => AppConfig::load_from_path(path)?,
            None => AppConfig::load()?,
        };
        debug!("Loaded config: {config:#?}");
        let storage = store::open_storage(&config)?;
        Ok(Self::new(config, storage, Arc::new(SystemClock)))
    }

    pub fn rate_engine(&self) -> RateEngine {
        RateEngine::from_config(&self.config, Arc::clone(&self.storage), Arc::clone(&self.clock))
    }

    pub fn resolver(&self) -> GeoResolver {
        GeoResolver::from_config(&self.config, Arc::clone(&self.storage), Arc::clone(&self.clock))
    }

    /// The scheduler that `run` drives and that settings changes re-arm.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

fn delivery_for(config: &AppConfig) -> Arc<dyn Delivery> {
    match &config.telegram {
        Some(telegram) => Arc::new(TelegramDelivery::new(telegram)),
        None => {
            info!("No Telegram bot configured, notifications go to stdout");
            Arc::new(ConsoleDelivery)
        }
    }
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let app = App::open(config_path)?;
    execute(&app, command).await
}

/// Runs a command against an already assembled app.
pub async fn execute(app: &App, command: AppCommand) -> Result<()> {
    match command {
        AppCommand::Run => cli::run::run(app).await,
        AppCommand::Rate { currencies } => cli::rate::run(&app.rate_engine(), &currencies).await,
        AppCommand::Resolve { city } => cli::resolve::run(&app.resolver(), &city).await,
        AppCommand::User { user_id, action } => cli::user::run(app, user_id, action).await,
    }
}
