use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::{ChatId, TopicId},
    errors::Error,
    Result,
};

/// Chats watched when `SOURCE_CHATS` is not set.
const DEFAULT_SOURCE_CHATS: &[i64] = &[
    -1003058619673,
    -1001556054753,
    -1002006131201,
    -1001685592361,
    -1002229136312,
    -1001513104671,
    -1001263412188,
];

const DEFAULT_DESTINATION_CHAT: i64 = -1002436012210;

/// Source chat → destination topic, used when `TOPIC_MAP` is not set.
const DEFAULT_TOPIC_MAP: &[(i64, i32)] = &[
    (-1003058619673, 1),
    (-1001263412188, 7049),
    (-1002229136312, 6804),
    (-1002006131201, 6802),
    (-1001556054753, 6803),
    (-1001685592361, 6803),
    (-1002337482415, 6801),
];

/// Typed configuration for the relay.
#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub telegram_bot_token: String,
    pub telegram_api_url: Option<String>,
    pub session_name: String,

    // Routing
    pub source_chats: Vec<ChatId>,
    pub destination_chat: ChatId,
    pub topic_map: HashMap<ChatId, TopicId>,

    // Files
    pub message_map_file: PathBuf,
    pub media_dir: PathBuf,

    // Outbound pacing
    pub send_min_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        let telegram_api_url = env_str("TELEGRAM_API_URL").and_then(non_empty);
        let session_name = env_str("SESSION_NAME")
            .and_then(non_empty)
            .unwrap_or_else(|| "relay".to_string());

        let source_chats = source_chats(env_str("SOURCE_CHATS").and_then(non_empty))?;

        let destination_chat = match env_str("DESTINATION_CHAT").and_then(non_empty) {
            Some(raw) => ChatId(raw.trim().parse::<i64>().map_err(|_| {
                Error::Config(format!("DESTINATION_CHAT is not a chat id: {raw}"))
            })?),
            None => ChatId(DEFAULT_DESTINATION_CHAT),
        };

        let topic_map = match env_str("TOPIC_MAP").and_then(non_empty) {
            Some(raw) => parse_topic_map(&raw)?,
            None => DEFAULT_TOPIC_MAP
                .iter()
                .map(|&(chat, topic)| (ChatId(chat), TopicId(topic)))
                .collect(),
        };

        let message_map_file =
            env_path("MESSAGE_MAP_FILE").unwrap_or_else(|| PathBuf::from("message_map.json"));
        let media_dir = env_path("MEDIA_DIR").unwrap_or_else(|| PathBuf::from("tmp_media"));

        // Scratch dir for staged media must exist before the first download.
        fs::create_dir_all(&media_dir)?;

        let send_min_interval =
            Duration::from_millis(env_u64("SEND_MIN_INTERVAL_MS").unwrap_or(1050));

        Ok(Self {
            telegram_bot_token,
            telegram_api_url,
            session_name,
            source_chats,
            destination_chat,
            topic_map,
            message_map_file,
            media_dir,
            send_min_interval,
        })
    }

    pub fn is_source(&self, chat_id: ChatId) -> bool {
        self.source_chats.contains(&chat_id)
    }
}

/// Parse `chat:topic` pairs separated by commas, e.g. `-1001:6803,-1002:1`.
/// Source chats from `SOURCE_CHATS`, or the compiled-in list when unset.
fn source_chats(raw: Option<String>) -> Result<Vec<ChatId>> {
    let chats: Vec<ChatId> = match raw {
        Some(raw) => parse_csv_i64(&raw)?.into_iter().map(ChatId).collect(),
        None => DEFAULT_SOURCE_CHATS.iter().copied().map(ChatId).collect(),
    };
    if chats.is_empty() {
        return Err(Error::Config("SOURCE_CHATS is empty".to_string()));
    }
    Ok(chats)
}

pub fn parse_topic_map(raw: &str) -> Result<HashMap<ChatId, TopicId>> {
    let mut out = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let Some((chat, topic)) = pair.rsplit_once(':') else {
            return Err(Error::Config(format!(
                "TOPIC_MAP entry is not chat:topic: {pair}"
            )));
        };
        let chat = chat
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::Config(format!("TOPIC_MAP has a bad chat id: {pair}")))?;
        let topic = topic
            .trim()
            .parse::<i32>()
            .map_err(|_| Error::Config(format!("TOPIC_MAP has a bad topic id: {pair}")))?;
        out.insert(ChatId(chat), TopicId(topic));
    }
    Ok(out)
}

fn parse_csv_i64(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("not a chat id: {s}")))
        })
        .collect()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
