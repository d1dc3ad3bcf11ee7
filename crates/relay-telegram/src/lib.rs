//! Telegram adapter (teloxide).
//!
//! This crate implements the `relay-core` RelayPort over the Telegram Bot API
//! and runs the update dispatcher.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use teloxide::{
    net::Download,
    payloads::SendDocument,
    prelude::*,
    requests::MultipartRequest,
    types::{InputFile, MessageId as TgMessageId},
};

use tokio::{io::AsyncWriteExt, time::sleep};

pub mod handlers;
pub mod router;

use relay_core::{
    domain::{ChatId, InboundMedia, MessageId, ReplyAnchor},
    errors::Error,
    media::{staged_file_name, OutgoingMedia, UploadAs},
    ports::RelayPort,
    Result,
};

/// Apply a reply anchor to any send request that supports threads and replies.
macro_rules! anchored {
    ($req:expr, $anchor:expr) => {{
        let mut req = $req;
        if let Some(thread) = thread_id($anchor) {
            req = req.message_thread_id(thread);
        }
        if let Some(reply) = reply_target($anchor) {
            req = req
                .reply_to_message_id(reply)
                .allow_sending_without_reply(true);
        }
        req
    }};
}

/// Thread to post into. The General topic takes no thread id.
fn thread_id(anchor: ReplyAnchor) -> Option<i32> {
    (!anchor.top.is_general()).then_some(anchor.top.0)
}

/// Explicit reply target. A topic-root anchor is expressed by the thread alone.
fn reply_target(anchor: ReplyAnchor) -> Option<TgMessageId> {
    (!anchor.is_topic_root()).then_some(TgMessageId(anchor.reply_to.0))
}

#[derive(Clone)]
pub struct TelegramRelay {
    bot: Bot,
}

impl TelegramRelay {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    /// Upload a staged file as a plain document.
    ///
    /// Content-type detection stays off so videos and GIFs are not turned into
    /// players server-side.
    fn document_request(
        &self,
        chat_id: ChatId,
        media: &OutgoingMedia,
        file_name: &str,
        anchor: ReplyAnchor,
    ) -> MultipartRequest<SendDocument> {
        let file = InputFile::file(&media.path).file_name(file_name.to_string());
        let mut req = self
            .bot
            .send_document(Self::tg_chat(chat_id), file)
            .disable_content_type_detection(true);
        if let Some(caption) = &media.caption {
            req = req.caption(caption.clone());
        }
        anchored!(req, anchor)
    }

    /// Run a request, sleeping out one flood-wait (`RetryAfter`) if Telegram asks.
    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!(wait_secs = d.as_secs(), "flood wait; retrying once");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl RelayPort for TelegramRelay {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        anchor: ReplyAnchor,
    ) -> Result<Option<MessageId>> {
        let msg = self
            .with_retry(|| {
                anchored!(
                    self.bot.send_message(Self::tg_chat(chat_id), text.to_string()),
                    anchor
                )
            })
            .await?;

        Ok(Some(MessageId(msg.id.0)))
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &OutgoingMedia,
        anchor: ReplyAnchor,
    ) -> Result<Option<MessageId>> {
        let msg = match &media.upload {
            UploadAs::Photo => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_photo(Self::tg_chat(chat_id), InputFile::file(&media.path));
                    if let Some(caption) = &media.caption {
                        req = req.caption(caption.clone());
                    }
                    anchored!(req, anchor)
                })
                .await?
            }
            UploadAs::Document { file_name } => {
                self.with_retry(|| self.document_request(chat_id, media, file_name, anchor))
                    .await?
            }
        };

        Ok(Some(MessageId(msg.id.0)))
    }

    async fn stage_media(
        &self,
        media: &InboundMedia,
        source: MessageId,
        dir: &Path,
    ) -> Result<Option<PathBuf>> {
        let Some(file_id) = media.file_id.as_deref() else {
            return Ok(None);
        };

        let file = self
            .with_retry(|| self.bot.get_file(file_id.to_string()))
            .await?;
        if file.path.is_empty() {
            return Ok(None);
        }

        tokio::fs::create_dir_all(dir).await?;
        let stamp = chrono::Utc::now().timestamp_millis();
        let path = dir.join(staged_file_name(media, source, stamp));

        let mut dst = tokio::fs::File::create(&path).await?;
        let downloaded = match self.bot.download_file(&file.path, &mut dst).await {
            Ok(()) => dst.flush().await.map_err(Error::from),
            Err(e) => Err(Error::External(format!("telegram download failed: {e}"))),
        };
        drop(dst);

        if let Err(e) = downloaded {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }

        Ok(Some(path))
    }
}
