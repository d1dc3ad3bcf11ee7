use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use relay_core::{
    config::Config,
    domain::ChatId,
    forward::Forwarder,
    mapping::MappingStore,
    ports::RelayPort,
    routing::Routes,
    throttled::{ThrottleConfig, ThrottledRelay},
};

use crate::handlers;
use crate::TelegramRelay;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub forwarder: Arc<Forwarder>,
}

impl AppState {
    fn is_source(&self, msg: &Message) -> bool {
        self.cfg.is_source(ChatId(msg.chat.id.0))
    }
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let mut bot = Bot::new(cfg.telegram_bot_token.clone());
    if let Some(url) = &cfg.telegram_api_url {
        bot = bot.set_api_url(reqwest::Url::parse(url)?);
    }

    match bot.get_me().await {
        Ok(me) => tracing::info!(
            session = %cfg.session_name,
            "relay started: @{}",
            me.username()
        ),
        Err(e) => tracing::warn!(error = %e, "could not fetch bot identity"),
    }
    tracing::info!(
        destination = cfg.destination_chat.0,
        sources = cfg.source_chats.len(),
        topics = cfg.topic_map.len(),
        media_dir = %cfg.media_dir.display(),
        "forwarding with media support and topic routing"
    );

    let store = MappingStore::open(&cfg.message_map_file);
    tracing::info!(
        entries = store.len(),
        path = %store.path().display(),
        "message map loaded"
    );

    // Flood-wait retries stay in the Telegram adapter; the decorator only paces sends.
    let raw_relay: Arc<dyn RelayPort> = Arc::new(TelegramRelay::new(bot.clone()));
    let relay: Arc<dyn RelayPort> = Arc::new(ThrottledRelay::new(
        raw_relay,
        ThrottleConfig::with_per_chat_interval(cfg.send_min_interval),
    ));

    let forwarder = Arc::new(Forwarder::new(
        Routes::from_config(&cfg),
        cfg.media_dir.clone(),
        relay,
        store,
    ));

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        forwarder,
    });

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter(|msg: Message, state: Arc<AppState>| state.is_source(&msg))
                .endpoint(handlers::handle_message),
        )
        .branch(
            Update::filter_channel_post()
                .filter(|msg: Message, state: Arc<AppState>| state.is_source(&msg))
                .endpoint(handlers::handle_message),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .build()
        .dispatch()
        .await;

    tracing::info!("dispatcher stopped");
    Ok(())
}
