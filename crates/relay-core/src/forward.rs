//! The per-message forward handler.

use std::{path::PathBuf, sync::Arc};

use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::{
    domain::{InboundMessage, MessageId},
    mapping::MappingStore,
    media::{OutgoingMedia, StagedMedia},
    ports::RelayPort,
    routing::{resolve_anchor, Routes},
    Error, Result,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The source chat has no destination topic configured.
    NoTopic,
    /// The attachment could not be staged locally.
    MediaUnavailable,
    /// The send succeeded but the response carried no message id.
    NoMessageId,
}

/// Result of forwarding one inbound message.
#[derive(Debug)]
pub enum ForwardOutcome {
    Forwarded(MessageId),
    Skipped(SkipReason),
    Failed(Error),
}

impl ForwardOutcome {
    pub fn forwarded_id(&self) -> Option<MessageId> {
        match self {
            Self::Forwarded(id) => Some(*id),
            _ => None,
        }
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Skipped(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Copies source-chat messages into destination topics, keeping reply chains.
///
/// Forwards run one at a time: the store lock is held for the whole forward,
/// so the load-mutate-save of the mapping never interleaves.
pub struct Forwarder {
    routes: Routes,
    media_dir: PathBuf,
    port: Arc<dyn RelayPort>,
    store: Mutex<MappingStore>,
}

impl Forwarder {
    pub fn new(
        routes: Routes,
        media_dir: impl Into<PathBuf>,
        port: Arc<dyn RelayPort>,
        store: MappingStore,
    ) -> Self {
        Self {
            routes,
            media_dir: media_dir.into(),
            port,
            store: Mutex::new(store),
        }
    }

    /// Destination id recorded for `source`, if it was forwarded.
    pub async fn mapped(&self, source: MessageId) -> Option<MessageId> {
        self.store.lock().await.get(source)
    }

    pub async fn mapped_count(&self) -> usize {
        self.store.lock().await.len()
    }

    /// Forward one message. Never fails: errors come back as `Failed`.
    pub async fn forward(&self, msg: &InboundMessage) -> ForwardOutcome {
        let mut store = self.store.lock().await;
        match self.try_forward(msg, &mut store).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    chat_id = msg.chat_id.0,
                    message_id = msg.message_id.0,
                    reply_to = ?msg.reply_to.map(|m| m.0),
                    has_media = msg.media.is_some(),
                    error = %e,
                    "forward failed"
                );
                ForwardOutcome::Failed(e)
            }
        }
    }

    async fn try_forward(
        &self,
        msg: &InboundMessage,
        store: &mut MappingStore,
    ) -> Result<ForwardOutcome> {
        let Some(topic) = self.routes.topic_for(msg.chat_id) else {
            info!(chat_id = msg.chat_id.0, "[skip] no topic mapped for source chat");
            return Ok(ForwardOutcome::Skipped(SkipReason::NoTopic));
        };

        let anchor = resolve_anchor(topic, msg.reply_to, |id| store.get(id));
        let destination = self.routes.destination();

        let sent = match &msg.media {
            None => {
                let text = msg.text.as_deref().unwrap_or_default();
                let sent = self.port.send_text(destination, text, anchor).await?;
                info!(
                    "[text] {} -> {}",
                    msg.message_id.0,
                    sent.map_or_else(|| "none".to_string(), |id| id.0.to_string())
                );
                sent
            }
            Some(media) => {
                let Some(path) = self
                    .port
                    .stage_media(media, msg.message_id, &self.media_dir)
                    .await?
                else {
                    warn!(
                        chat_id = msg.chat_id.0,
                        message_id = msg.message_id.0,
                        "failed to download media"
                    );
                    return Ok(ForwardOutcome::Skipped(SkipReason::MediaUnavailable));
                };
                // Dropping the guard removes the file on every path out of here.
                let staged = StagedMedia::new(path);

                let outgoing = OutgoingMedia::new(staged.path(), msg.text.as_deref(), media.kind)?;
                let sent = self.port.send_media(destination, &outgoing, anchor).await?;
                info!(
                    "[media] {} -> {} ({})",
                    msg.message_id.0,
                    sent.map_or_else(|| "none".to_string(), |id| id.0.to_string()),
                    staged.path().display()
                );
                sent
            }
        };

        let Some(sent_id) = sent else {
            warn!(
                message_id = msg.message_id.0,
                "send returned no message id; mapping not recorded"
            );
            return Ok(ForwardOutcome::Skipped(SkipReason::NoMessageId));
        };

        store.record(msg.message_id, sent_id)?;
        Ok(ForwardOutcome::Forwarded(sent_id))
    }
}
