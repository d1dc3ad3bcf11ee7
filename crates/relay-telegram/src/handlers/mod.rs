//! Telegram update handlers.
//!
//! Updates from source chats are converted into `relay-core` inbound messages
//! here; attachment classification happens once, in `inbound_media`.

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{Message, MessageKind},
};

use relay_core::{
    domain::{ChatId, InboundMedia, InboundMessage, MediaKind, MessageId},
    forward::ForwardOutcome,
};

use crate::router::AppState;

pub async fn handle_message(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(inbound) = inbound_from_message(&msg) else {
        tracing::debug!(
            chat_id = msg.chat.id.0,
            message_id = msg.id.0,
            "ignoring service message"
        );
        return Ok(());
    };

    // Failures are logged inside the forwarder; nothing is retried here.
    match state.forwarder.forward(&inbound).await {
        ForwardOutcome::Forwarded(id) => tracing::debug!(
            chat_id = inbound.chat_id.0,
            source = inbound.message_id.0,
            destination = id.0,
            "forwarded"
        ),
        ForwardOutcome::Skipped(reason) => tracing::debug!(
            chat_id = inbound.chat_id.0,
            source = inbound.message_id.0,
            ?reason,
            "skipped"
        ),
        ForwardOutcome::Failed(_) => {}
    }

    Ok(())
}

/// Convert a Telegram message into the relay's inbound model.
///
/// Returns `None` for service messages (joins, pins, topic events...).
pub fn inbound_from_message(msg: &Message) -> Option<InboundMessage> {
    let media = match &msg.kind {
        MessageKind::Common(_) => inbound_media(msg),
        // Dice arrives as its own kind but is relayed like other fileless media.
        MessageKind::Dice(_) => Some(fileless_media()),
        _ => return None,
    };
    let text = if media.is_some() {
        msg.caption()
    } else {
        msg.text()
    };

    Some(InboundMessage {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
        reply_to: msg.reply_to_message().map(|m| MessageId(m.id.0)),
        text: text.map(str::to_string),
        media,
    })
}

fn with_file(kind: MediaKind, file_id: &str, file_name: Option<&String>) -> Option<InboundMedia> {
    Some(InboundMedia {
        kind,
        file_id: Some(file_id.to_string()),
        file_name: file_name.cloned(),
    })
}

fn inbound_media(msg: &Message) -> Option<InboundMedia> {
    if let Some(sizes) = msg.photo() {
        // Sizes are ordered smallest first.
        let best = sizes.last()?;
        return with_file(MediaKind::Photo, &best.file.id, None);
    }
    if let Some(v) = msg.video() {
        return with_file(MediaKind::Video, &v.file.id, v.file_name.as_ref());
    }
    if let Some(a) = msg.animation() {
        return with_file(MediaKind::Video, &a.file.id, a.file_name.as_ref());
    }
    if let Some(n) = msg.video_note() {
        return with_file(MediaKind::Video, &n.file.id, None);
    }
    if let Some(d) = msg.document() {
        return with_file(MediaKind::GenericDocument, &d.file.id, d.file_name.as_ref());
    }
    if let Some(a) = msg.audio() {
        return with_file(MediaKind::GenericDocument, &a.file.id, a.file_name.as_ref());
    }
    if let Some(v) = msg.voice() {
        return with_file(MediaKind::GenericDocument, &v.file.id, None);
    }
    if let Some(s) = msg.sticker() {
        return with_file(MediaKind::GenericDocument, &s.file.id, None);
    }

    // Media with nothing to download still counts as media.
    let fileless = msg.location().is_some()
        || msg.contact().is_some()
        || msg.poll().is_some()
        || msg.venue().is_some()
        || msg.game().is_some();
    fileless.then(fileless_media)
}

fn fileless_media() -> InboundMedia {
    InboundMedia {
        kind: MediaKind::GenericDocument,
        file_id: None,
        file_name: None,
    }
}
