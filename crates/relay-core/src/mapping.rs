//! Persisted source-message-id → destination-message-id table.
//!
//! The on-disk format is a flat JSON object with string keys, e.g.
//! `{"17": 9042, "18": 9043}`.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use crate::{domain::MessageId, Result};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageMap {
    entries: HashMap<MessageId, MessageId>,
}

impl MessageMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the table at `path`.
    ///
    /// A missing, unreadable or malformed file yields an empty table.
    pub fn load(path: &Path) -> Self {
        let txt = match fs::read_to_string(path) {
            Ok(txt) => txt,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "message map unreadable; starting empty");
                return Self::new();
            }
        };

        match parse_entries(&txt) {
            Some(entries) => Self { entries },
            None => {
                tracing::warn!(path = %path.display(), "message map is malformed; starting empty");
                Self::new()
            }
        }
    }

    /// Rewrite the whole file at `path` with the current table.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw: BTreeMap<String, i32> = self
            .entries
            .iter()
            .map(|(k, v)| (k.0.to_string(), v.0))
            .collect();
        let txt = serde_json::to_string(&raw)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write next to the target, then rename over it.
        let tmp = tmp_path(path);
        fs::write(&tmp, txt)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn get(&self, source: MessageId) -> Option<MessageId> {
        self.entries.get(&source).copied()
    }

    pub fn insert(&mut self, source: MessageId, destination: MessageId) {
        self.entries.insert(source, destination);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_entries(txt: &str) -> Option<HashMap<MessageId, MessageId>> {
    let raw: HashMap<String, i64> = serde_json::from_str(txt).ok()?;
    raw.into_iter()
        .map(|(k, v)| {
            let key = k.trim().parse::<i32>().ok()?;
            let val = i32::try_from(v).ok()?;
            Some((MessageId(key), MessageId(val)))
        })
        .collect()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// The message map together with where it lives on disk.
///
/// The forward handler owns one of these; `record` is the only write path and
/// persists the whole table every time.
#[derive(Debug)]
pub struct MappingStore {
    path: PathBuf,
    map: MessageMap,
}

impl MappingStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let map = MessageMap::load(&path);
        Self { path, map }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, source: MessageId) -> Option<MessageId> {
        self.map.get(source)
    }

    /// Remember `source → destination` and rewrite the file.
    pub fn record(&mut self, source: MessageId, destination: MessageId) -> Result<()> {
        self.map.insert(source, destination);
        self.map.save(&self.path)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_file(name: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!("{name}-{}.json", std::process::id()));
        let _ = fs::remove_file(&p);
        p
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = tmp_file("relay-map-roundtrip");
        let mut m = MessageMap::new();
        m.insert(MessageId(17), MessageId(9042));
        m.insert(MessageId(18), MessageId(9043));
        m.save(&path).unwrap();

        assert_eq!(MessageMap::load(&path), m);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn empty_map_round_trips() {
        let path = tmp_file("relay-map-empty");
        MessageMap::new().save(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
        assert!(MessageMap::load(&path).is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn keys_are_written_as_strings() {
        let path = tmp_file("relay-map-format");
        let mut m = MessageMap::new();
        m.insert(MessageId(5), MessageId(700));
        m.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw, serde_json::json!({ "5": 700 }));
        assert!(!tmp_path(&path).exists());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_loads_empty() {
        let path = tmp_file("relay-map-missing");
        assert!(MessageMap::load(&path).is_empty());
    }

    #[test]
    fn corrupt_file_loads_empty() {
        let path = tmp_file("relay-map-corrupt");
        for junk in ["not json", "[1, 2]", r#"{"a": 1}"#, r#"{"1": "x"}"#, ""] {
            fs::write(&path, junk).unwrap();
            assert!(MessageMap::load(&path).is_empty(), "{junk:?}");
        }
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn store_record_persists_immediately() {
        let path = tmp_file("relay-store-record");
        let mut store = MappingStore::open(&path);
        assert!(store.is_empty());

        store.record(MessageId(1), MessageId(100)).unwrap();
        store.record(MessageId(2), MessageId(101)).unwrap();

        let reopened = MappingStore::open(&path);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.get(MessageId(2)), Some(MessageId(101)));
        assert_eq!(reopened.get(MessageId(3)), None);
        let _ = fs::remove_file(&path);
    }
}
