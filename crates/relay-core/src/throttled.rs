use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{ChatId, InboundMedia, MessageId, ReplyAnchor},
    media::OutgoingMedia,
    ports::RelayPort,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* outbound sends (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between sends into the same chat.
    pub per_chat_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            global_min_interval: Duration::from_millis(40), // ~25/sec
            per_chat_min_interval: Duration::from_millis(1050), // ~0.95/sec
        }
    }
}

impl ThrottleConfig {
    pub fn with_per_chat_interval(interval: Duration) -> Self {
        Self {
            per_chat_min_interval: interval,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// RelayPort decorator that paces outbound sends.
///
/// Staging (downloads) is passed through untouched; only the sends that land
/// in a chat count against the limits.
pub struct ThrottledRelay {
    inner: Arc<dyn RelayPort>,
    cfg: ThrottleConfig,
    global: Mutex<IntervalLimiter>,
    per_chat: Mutex<HashMap<i64, Arc<Mutex<IntervalLimiter>>>>,
}

impl ThrottledRelay {
    pub fn new(inner: Arc<dyn RelayPort>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(IntervalLimiter::new(cfg.global_min_interval)),
            per_chat: Mutex::new(HashMap::new()),
        }
    }

    async fn limiter_for_chat(&self, chat_id: i64) -> Arc<Mutex<IntervalLimiter>> {
        let mut map = self.per_chat.lock().await;
        map.entry(chat_id)
            .or_insert_with(|| {
                Arc::new(Mutex::new(IntervalLimiter::new(
                    self.cfg.per_chat_min_interval,
                )))
            })
            .clone()
    }

    async fn throttle_chat(&self, chat_id: i64) {
        let global_wait = { self.global.lock().await.reserve() };
        let chat_wait = {
            let lim = self.limiter_for_chat(chat_id).await;
            let mut guard = lim.lock().await;
            guard.reserve()
        };

        let wait = global_wait.max(chat_wait);
        if !wait.is_zero() {
            tracing::debug!(chat_id, wait_ms = wait.as_millis() as u64, "throttling send");
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl RelayPort for ThrottledRelay {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        anchor: ReplyAnchor,
    ) -> Result<Option<MessageId>> {
        self.throttle_chat(chat_id.0).await;
        self.inner.send_text(chat_id, text, anchor).await
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: &OutgoingMedia,
        anchor: ReplyAnchor,
    ) -> Result<Option<MessageId>> {
        self.throttle_chat(chat_id.0).await;
        self.inner.send_media(chat_id, media, anchor).await
    }

    async fn stage_media(
        &self,
        media: &InboundMedia,
        source: MessageId,
        dir: &Path,
    ) -> Result<Option<PathBuf>> {
        self.inner.stage_media(media, source, dir).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TopicId;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn limiter_spaces_reservations() {
        let mut lim = IntervalLimiter::new(Duration::from_secs(10));
        assert_eq!(lim.reserve(), Duration::ZERO);
        let second = lim.reserve();
        assert!(second > Duration::from_secs(9), "{second:?}");
        let third = lim.reserve();
        assert!(third > Duration::from_secs(19), "{third:?}");
    }

    #[derive(Default)]
    struct CountingRelay {
        calls: StdMutex<Vec<&'static str>>,
    }

    #[async_trait::async_trait]
    impl RelayPort for CountingRelay {
        async fn send_text(
            &self,
            _chat_id: ChatId,
            _text: &str,
            _anchor: ReplyAnchor,
        ) -> Result<Option<MessageId>> {
            self.calls.lock().unwrap().push("text");
            Ok(Some(MessageId(1)))
        }

        async fn send_media(
            &self,
            _chat_id: ChatId,
            _media: &OutgoingMedia,
            _anchor: ReplyAnchor,
        ) -> Result<Option<MessageId>> {
            self.calls.lock().unwrap().push("media");
            Ok(Some(MessageId(2)))
        }

        async fn stage_media(
            &self,
            _media: &InboundMedia,
            _source: MessageId,
            _dir: &Path,
        ) -> Result<Option<PathBuf>> {
            self.calls.lock().unwrap().push("stage");
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sends_to_same_chat_are_spaced() {
        let inner = Arc::new(CountingRelay::default());
        let relay = ThrottledRelay::new(
            inner.clone(),
            ThrottleConfig::with_per_chat_interval(Duration::from_secs(3)),
        );
        let anchor = ReplyAnchor::topic_root(TopicId(10));

        let started = Instant::now();
        relay.send_text(ChatId(-1), "a", anchor).await.unwrap();
        relay.send_text(ChatId(-1), "b", anchor).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));

        assert_eq!(*inner.calls.lock().unwrap(), vec!["text", "text"]);
    }

    #[tokio::test(start_paused = true)]
    async fn staging_is_not_throttled() {
        let inner = Arc::new(CountingRelay::default());
        let relay = ThrottledRelay::new(
            inner.clone(),
            ThrottleConfig::with_per_chat_interval(Duration::from_secs(3)),
        );
        let media = InboundMedia {
            kind: crate::domain::MediaKind::Photo,
            file_id: Some("f".to_string()),
            file_name: None,
        };

        let started = Instant::now();
        for _ in 0..3 {
            relay
                .stage_media(&media, MessageId(1), Path::new("/tmp"))
                .await
                .unwrap();
        }
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
