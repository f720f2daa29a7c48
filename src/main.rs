use serenity::prelude::*;

use dotenv::dotenv;
use std::env;
use std::sync::Arc;

use shojinbot::acapi::{self, AtcoderClient};
use shojinbot::acbot::Handler;
use shojinbot::acdb::Db;
use shojinbot::sync::SyncEngine;

use anyhow::{Context, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Begin logger
    env_logger::init();

    // Load discord bot token
    dotenv().ok();
    let token = env::var("DISCORD_TOKEN")
        .context("Expected 'DISCORD_TOKEN=<token>' in .env in project root.")?;

    // Initialize database
    let db_path = env::var("SHOJIN_DB").unwrap_or_else(|_| String::from("shojin.db"));
    let db = Db::open(&db_path)?;
    db.initialize()?;

    // Judge API client and sync engine, shared by the command surface and
    // the scheduled jobs.
    let base_url =
        env::var("ATCODER_API_BASE").unwrap_or_else(|_| String::from(acapi::DEFAULT_BASE_URL));
    let api = Arc::new(AtcoderClient::new(base_url));
    let engine = Arc::new(SyncEngine::new(Arc::clone(&api), db.clone()));

    let intents = GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&token, intents)
        .event_handler(Handler::new(db, api, engine))
        .await
        .context("Error creating client.")?;

    if let Err(why) = client.start().await {
        log::error!("Client error: {why:?}");
    }

    Ok(())
}
