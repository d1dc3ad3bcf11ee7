use std::collections::HashMap;

use crate::{
    config::Config,
    domain::{ChatId, MessageId, ReplyAnchor, TopicId},
};

/// Where messages from each source chat land.
#[derive(Clone, Debug)]
pub struct Routes {
    destination: ChatId,
    topics: HashMap<ChatId, TopicId>,
}

impl Routes {
    pub fn new(destination: ChatId, topics: HashMap<ChatId, TopicId>) -> Self {
        Self {
            destination,
            topics,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.destination_chat, cfg.topic_map.clone())
    }

    pub fn destination(&self) -> ChatId {
        self.destination
    }

    pub fn topic_for(&self, source: ChatId) -> Option<TopicId> {
        self.topics.get(&source).copied()
    }
}

/// Pick the reply anchor for a forwarded message.
///
/// A reply whose original was forwarded earlier points at that copy; anything
/// else points at the topic root. The thread is always `topic`.
pub fn resolve_anchor(
    topic: TopicId,
    reply_to: Option<MessageId>,
    lookup: impl Fn(MessageId) -> Option<MessageId>,
) -> ReplyAnchor {
    match reply_to.and_then(lookup) {
        Some(mapped) => ReplyAnchor {
            reply_to: mapped,
            top: topic,
        },
        None => ReplyAnchor::topic_root(topic),
    }
}
