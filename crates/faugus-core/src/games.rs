use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::error::write_atomic;

/// Runner value meaning "run the executable directly, no compatibility layer".
pub const NATIVE_RUNNER: &str = "Linux-Native";

/// One entry of `games.json`.
///
/// Toggles are read from either JSON booleans or the string tokens older
/// launcher versions stored, and written back in the string form so both can
/// share the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub gameid: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub launch_arguments: String,
    #[serde(default)]
    pub game_arguments: String,
    #[serde(default)]
    pub runner: String,
    #[serde(default)]
    pub protonfix: String,
    #[serde(default, with = "legacy::mangohud")]
    pub mangohud: bool,
    #[serde(default, with = "legacy::gamemode")]
    pub gamemode: bool,
    #[serde(default, with = "legacy::disable_hidraw")]
    pub disable_hidraw: bool,
    #[serde(default, rename = "addapp_checkbox", with = "legacy::addapp")]
    pub addapp_enabled: bool,
    #[serde(default, rename = "addapp_bat")]
    pub addapp_script: String,
    #[serde(default, with = "legacy::lossless")]
    pub lossless: Option<u8>,
    /// Banner, icon and whatever else the editor stores; preserved untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GameConfig {
    pub fn new(title: &str, path: &str, prefix: &str) -> Self {
        Self {
            gameid: slugify(title),
            title: title.to_string(),
            path: path.to_string(),
            prefix: prefix.to_string(),
            ..Default::default()
        }
    }

    pub fn is_native(&self) -> bool {
        self.runner == NATIVE_RUNNER
    }
}

/// Stable id derived from a title: lowercase ASCII alphanumerics with every
/// other run of characters collapsed to a single `-`.
pub fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

/// The `games.json` array.
#[derive(Debug, Clone)]
pub struct GameStore {
    path: PathBuf,
    games: Vec<GameConfig>,
    /// Records that did not parse; written back untouched on save.
    unreadable: Vec<serde_json::Value>,
}

impl GameStore {
    /// A missing file, or one that is not a JSON array, is an empty list.
    /// Records that do not parse are skipped one by one.
    pub fn load(path: &Path) -> Self {
        let mut store = Self {
            path: path.to_path_buf(),
            games: Vec::new(),
            unreadable: Vec::new(),
        };
        let Ok(raw) = std::fs::read(path) else {
            return store;
        };
        let records = match serde_json::from_slice::<Vec<serde_json::Value>>(&raw) {
            Ok(v) => v,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "games list is malformed, treating as empty");
                return store;
            }
        };
        for (index, record) in records.into_iter().enumerate() {
            match GameConfig::deserialize(&record) {
                Ok(game) => store.games.push(game),
                Err(err) => {
                    tracing::warn!(path = %path.display(), index, error = %err, "skipping unreadable game entry");
                    store.unreadable.push(record);
                }
            }
        }
        tracing::debug!(path = %path.display(), games = store.games.len(), "games loaded");
        store
    }

    pub fn games(&self) -> &[GameConfig] {
        &self.games
    }

    pub fn find(&self, gameid: &str) -> Option<&GameConfig> {
        self.games.iter().find(|g| g.gameid == gameid)
    }

    pub fn find_by_title(&self, title: &str) -> Option<&GameConfig> {
        self.games.iter().find(|g| g.title == title)
    }

    pub fn insert(&mut self, game: GameConfig) -> crate::Result<()> {
        if self.find(&game.gameid).is_some() {
            return Err(Error::DuplicateGameId(game.gameid));
        }
        self.games.push(game);
        Ok(())
    }

    pub fn save(&self) -> crate::Result<()> {
        let mut records = Vec::with_capacity(self.games.len() + self.unreadable.len());
        for game in &self.games {
            records.push(serde_json::to_value(game).map_err(|source| Error::Json {
                context: format!("serialize game {}", game.gameid),
                source,
            })?);
        }
        records.extend(self.unreadable.iter().cloned());
        let data = serde_json::to_vec_pretty(&records).map_err(|source| Error::Json {
            context: "serialize games list".to_string(),
            source,
        })?;
        write_atomic(&self.path, &data)
    }
}

mod legacy {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Int(u64),
        Str(String),
    }

    fn toggle<'de, D: Deserializer<'de>>(d: D, on_token: Option<&str>) -> Result<bool, D::Error> {
        Ok(match Option::<Raw>::deserialize(d)? {
            None => false,
            Some(Raw::Bool(b)) => b,
            Some(Raw::Int(n)) => n != 0,
            Some(Raw::Str(s)) => {
                let s = s.trim();
                match on_token {
                    Some(token) => s == token || s.eq_ignore_ascii_case("true"),
                    None => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
                }
            }
        })
    }

    macro_rules! token_toggle {
        ($name:ident, $token:expr, $strict:expr) => {
            pub mod $name {
                use super::*;

                pub fn serialize<S: Serializer>(v: &bool, s: S) -> Result<S::Ok, S::Error> {
                    s.serialize_str(if *v { $token } else { "" })
                }

                pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
                    toggle(d, if $strict { Some($token) } else { None })
                }
            }
        };
    }

    token_toggle!(mangohud, "MANGOHUD=1", false);
    token_toggle!(gamemode, "gamemoderun", false);
    token_toggle!(disable_hidraw, "PROTON_DISABLE_HIDRAW=1", false);
    token_toggle!(addapp, "addapp_enabled", true);

    pub mod lossless {
        use super::*;

        pub fn serialize<S: Serializer>(v: &Option<u8>, s: S) -> Result<S::Ok, S::Error> {
            match v {
                Some(n) => s.serialize_str(&format!("X{n}")),
                None => s.serialize_str("Off"),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u8>, D::Error> {
            let n = match Option::<Raw>::deserialize(d)? {
                None | Some(Raw::Bool(_)) => None,
                Some(Raw::Int(n)) => u8::try_from(n).ok(),
                Some(Raw::Str(s)) => {
                    let s = s.trim();
                    s.strip_prefix(['X', 'x'])
                        .unwrap_or(s)
                        .parse::<u8>()
                        .ok()
                }
            };
            Ok(n.filter(|n| *n > 0))
        }
    }
}
