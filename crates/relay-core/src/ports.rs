use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, InboundMedia, MessageId, ReplyAnchor},
    media::OutgoingMedia,
    Result,
};

/// Hexagonal port between the forward handler and the chat client.
///
/// Send methods return the id of the created message, or `None` when the
/// client response carried no message id.
#[async_trait]
pub trait RelayPort: Send + Sync {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        anchor: ReplyAnchor,
    ) -> Result<Option<MessageId>>;

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &OutgoingMedia,
        anchor: ReplyAnchor,
    ) -> Result<Option<MessageId>>;

    /// Download `media` into `dir`.
    ///
    /// `Ok(None)` means there was nothing usable to download.
    async fn stage_media(
        &self,
        media: &InboundMedia,
        source: MessageId,
        dir: &Path,
    ) -> Result<Option<PathBuf>>;
}
