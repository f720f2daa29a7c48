use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serenity::async_trait;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;

use crate::acapi::AtcoderClient;
use crate::acdb::Db;
use crate::notify::{DiscordSink, NotificationDispatcher};
use crate::scheduler::Scheduler;
use crate::sync::SyncEngine;

pub mod commands;
use commands::Commands;

pub struct Handler {
    pub(crate) db: Db,
    pub(crate) api: Arc<AtcoderClient>,
    pub(crate) engine: Arc<SyncEngine<AtcoderClient>>,

    scheduler_started: AtomicBool,
}

impl Handler {
    pub fn new(db: Db, api: Arc<AtcoderClient>, engine: Arc<SyncEngine<AtcoderClient>>) -> Self {
        Self {
            db,
            api,
            engine,
            scheduler_started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: serenity::client::Context, _ready: Ready) {
        log::info!("Bot is connected and ready!");

        // `ready` fires again on every reconnect; the job table must only
        // start once.
        if self.scheduler_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let sink = DiscordSink::new(Arc::clone(&ctx.http));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::clone(&self.api),
            self.db.clone(),
            sink,
        ));
        Scheduler::new(Arc::clone(&self.engine), dispatcher).start();
    }

    async fn message(&self, ctx: serenity::client::Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let channel = msg.channel_id;
        let content = msg.content.clone();

        if content.starts_with(commands::call_token()) && content.len() > 1 {
            let response = match Commands::run_command(self, &ctx, &msg).await {
                Ok(message) => message,
                Err(err) => format!("Error: {}", err),
            };

            // Discord doesn't like sending empty messages.
            // If everything is ok and the bot doesn't have anything to say,
            // return early.
            if response.is_empty() {
                return;
            }

            // Attempt to send response.
            // If something goes wrong, we want to let the user know, if
            // possible, so we try to send another "Oops, internal error"
            // before exiting. If *that* message can't be sent, it can't be
            // helped... but it will be logged on our end anyways.
            if let Err(why) = channel.say(&ctx.http, response).await {
                let _ = channel.say(&ctx.http, "Oops, internal error.").await;
                log::error!("Error sending message: {why:?}");
            }
        }
    }
}
