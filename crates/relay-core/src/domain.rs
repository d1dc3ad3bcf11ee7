/// Telegram chat id (numeric, `-100…` for supergroups and channels).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric, unique per chat).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub i32);

/// Forum topic id: the message id of the topic's root message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TopicId(pub i32);

impl TopicId {
    /// The forum's built-in "General" topic.
    pub const GENERAL: TopicId = TopicId(1);

    pub fn is_general(self) -> bool {
        self == Self::GENERAL
    }

    /// The topic root, as a message to reply to.
    pub fn root(self) -> MessageId {
        MessageId(self.0)
    }
}

/// The (message, thread) pair a forwarded message is sent as a reply to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplyAnchor {
    pub reply_to: MessageId,
    pub top: TopicId,
}

impl ReplyAnchor {
    /// Anchor pointing at the root of `topic`.
    pub fn topic_root(topic: TopicId) -> Self {
        Self {
            reply_to: topic.root(),
            top: topic,
        }
    }

    pub fn is_topic_root(&self) -> bool {
        self.reply_to == self.top.root()
    }
}

/// Closed classification of an inbound attachment, decided once by the adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    /// Videos, animations (GIFs) and video notes.
    Video,
    GenericDocument,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMedia {
    pub kind: MediaKind,
    /// `None` for media without a downloadable file (location, poll, contact...).
    pub file_id: Option<String>,
    pub file_name: Option<String>,
}

/// A message observed in a source chat, stripped of client-specific types.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub reply_to: Option<MessageId>,
    /// Message text, or the caption for media messages.
    pub text: Option<String>,
    pub media: Option<InboundMedia>,
}

impl InboundMessage {
    pub fn text(chat_id: ChatId, message_id: MessageId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            message_id,
            reply_to: None,
            text: Some(text.into()),
            media: None,
        }
    }
}
