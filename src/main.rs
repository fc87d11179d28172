use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use vkinder::bot::Dispatcher;
use vkinder::config::BotConfig;
use vkinder::db;
use vkinder::dialogue::PgSessionStore;
use vkinder::localization::init_localization;
use vkinder::logging::init_logging;
use vkinder::repository::PgRepository;
use vkinder::vk::{LongPollClient, VkClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = BotConfig::from_env().context("Invalid configuration")?;
    init_logging(config.log_format)?;

    info!("Starting VKinder bot");

    init_localization()?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to the database")?;

    if config.reset_database {
        info!("RESET_DATABASE is set, recreating all tables");
        db::reset_database(&pool).await?;
    } else {
        db::init_database_schema(&pool).await?;
    }

    let user_client = VkClient::user_client(&config.vk)?;
    let group_client = VkClient::group_client(&config.vk)?;

    let group_id = match config.vk.group_id {
        Some(id) => id,
        None => group_client
            .resolve_group_id()
            .await
            .context("Failed to resolve the community id")?,
    };
    info!(group_id, "Community resolved");

    let poller = LongPollClient::new(group_client.clone(), group_id, config.vk.long_poll_wait_secs);

    let dispatcher = Dispatcher::new(
        Arc::new(user_client),
        Arc::new(PgRepository::new(pool.clone())),
        Arc::new(group_client),
        Arc::new(PgSessionStore::new(pool.clone())),
        config.search.clone(),
        config.default_language.clone(),
    );

    dispatcher.run(poller).await?;

    pool.close().await;
    info!("VKinder bot stopped");
    Ok(())
}
