use std::path::{Path, PathBuf};

use crate::error::{IoContext, write_atomic};

/// Keys whose values are written back quoted.
const QUOTED_KEYS: &[&str] = &["default-prefix", "default-runner"];

const DEFAULTS: &[(&str, &str)] = &[
    ("close-onlaunch", "False"),
    ("default-prefix", ""),
    ("mangohud", "False"),
    ("gamemode", "False"),
    ("disable-hidraw", "False"),
    ("default-runner", "GE-Proton"),
    ("lossless-location", "False"),
    ("discrete-gpu", "False"),
    ("splash-disable", "False"),
    ("enable-logging", "False"),
    ("wayland-driver", "False"),
    ("enable-hdr", "False"),
    ("enable-ntsync", "False"),
    ("enable-wow64", "False"),
];

/// Launcher-wide settings from `config.ini` (`key=value` per line).
///
/// Unknown keys are kept in file order so a write-back never drops settings
/// owned by other tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    entries: Vec<(String, String)>,
}

impl GlobalConfig {
    pub fn parse(text: &str) -> Self {
        let mut entries: Vec<(String, String)> = Vec::new();
        for line in text.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_string();
            let value = value.trim().trim_matches('"').to_string();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
        Self { entries }
    }

    /// Fill in defaults for missing keys. Returns whether anything was added.
    fn apply_defaults(&mut self, default_prefix: &Path) -> bool {
        let mut added = false;
        for (key, value) in DEFAULTS {
            if self.get(key).is_some() {
                continue;
            }
            let value = if *key == "default-prefix" {
                default_prefix.display().to_string()
            } else {
                value.to_string()
            };
            self.entries.push((key.to_string(), value));
            added = true;
        }
        added
    }

    /// Read the config; a missing or unreadable file yields defaults.
    pub fn load(path: &Path, default_prefix: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "config not readable, using defaults");
                String::new()
            }
        };
        let mut cfg = Self::parse(&text);
        cfg.apply_defaults(default_prefix);
        cfg
    }

    /// Read the config and persist any defaults that were missing.
    pub fn load_or_init(path: &Path, default_prefix: &Path) -> crate::Result<Self> {
        let existed = path.is_file();
        let text = if existed {
            std::fs::read_to_string(path).io_context(|| format!("read {}", path.display()))?
        } else {
            String::new()
        };
        let mut cfg = Self::parse(&text);
        if cfg.apply_defaults(default_prefix) || !existed {
            cfg.save(path)?;
        }
        Ok(cfg)
    }

    pub fn to_ini(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            if QUOTED_KEYS.contains(&key.as_str()) {
                out.push_str(&format!("{key}=\"{value}\"\n"));
            } else {
                out.push_str(&format!("{key}={value}\n"));
            }
        }
        out
    }

    pub fn save(&self, path: &Path) -> crate::Result<()> {
        write_atomic(path, self.to_ini().as_bytes())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        self.get(key) == Some("True")
    }

    pub fn default_prefix(&self) -> PathBuf {
        PathBuf::from(self.get("default-prefix").unwrap_or_default())
    }

    /// Runner identifier for games without one. The settings UI stores
    /// display names for the "latest" choices.
    pub fn default_runner(&self) -> String {
        match self.get("default-runner").unwrap_or_default() {
            "UMU-Proton Latest" => String::new(),
            "GE-Proton Latest (default)" => "GE-Proton".to_string(),
            "Proton-EM Latest" => "Proton-EM".to_string(),
            other => other.to_string(),
        }
    }

    pub fn lossless_location(&self) -> Option<&str> {
        self.get("lossless-location")
            .filter(|v| !v.is_empty() && *v != "False")
    }

    pub fn discrete_gpu(&self) -> bool {
        self.flag("discrete-gpu")
    }

    pub fn splash_disable(&self) -> bool {
        self.flag("splash-disable")
    }

    pub fn enable_logging(&self) -> bool {
        self.flag("enable-logging")
    }

    pub fn wayland_driver(&self) -> bool {
        self.flag("wayland-driver")
    }

    pub fn enable_hdr(&self) -> bool {
        self.flag("enable-hdr")
    }

    pub fn enable_ntsync(&self) -> bool {
        self.flag("enable-ntsync")
    }

    pub fn enable_wow64(&self) -> bool {
        self.flag("enable-wow64")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::temp_dir_for;

    #[test]
    fn parse_strips_quotes_and_whitespace() {
        let cfg = GlobalConfig::parse(
            "default-prefix=\"/home/u/Faugus\"\n enable-logging = True\nno equals sign\n",
        );
        assert_eq!(cfg.get("default-prefix"), Some("/home/u/Faugus"));
        assert!(cfg.enable_logging());
        assert!(!cfg.discrete_gpu());
    }

    #[test]
    fn default_runner_aliases_map_to_identifiers() {
        let mut cfg = GlobalConfig::parse("");
        cfg.set("default-runner", "GE-Proton Latest (default)");
        assert_eq!(cfg.default_runner(), "GE-Proton");
        cfg.set("default-runner", "UMU-Proton Latest");
        assert_eq!(cfg.default_runner(), "");
        cfg.set("default-runner", "Proton-EM Latest");
        assert_eq!(cfg.default_runner(), "Proton-EM");
        cfg.set("default-runner", "GE-Proton9-20");
        assert_eq!(cfg.default_runner(), "GE-Proton9-20");
    }

    #[test]
    fn lossless_location_false_means_unset() {
        let cfg = GlobalConfig::parse("lossless-location=False\n");
        assert_eq!(cfg.lossless_location(), None);
        let cfg = GlobalConfig::parse("lossless-location=/opt/lsfg/Lossless.dll\n");
        assert_eq!(cfg.lossless_location(), Some("/opt/lsfg/Lossless.dll"));
    }

    #[test]
    fn load_missing_file_yields_defaults() {
        let dir = temp_dir_for("config-missing");
        let cfg = GlobalConfig::load(&dir.join("config.ini"), Path::new("/home/u/Faugus"));
        assert_eq!(cfg.default_prefix(), PathBuf::from("/home/u/Faugus"));
        assert_eq!(cfg.default_runner(), "GE-Proton");
        assert!(!cfg.splash_disable());
        assert!(!dir.join("config.ini").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_or_init_writes_missing_defaults_and_keeps_unknown_keys() {
        let dir = temp_dir_for("config-init");
        let path = dir.join("faugus-launcher").join("config.ini");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "language=pt_BR\nenable-logging=True\n").unwrap();

        let cfg = GlobalConfig::load_or_init(&path, Path::new("/p")).unwrap();
        assert!(cfg.enable_logging());

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("language=pt_BR\nenable-logging=True\n"));
        assert!(written.contains("default-prefix=\"/p\"\n"));
        assert!(written.contains("default-runner=\"GE-Proton\"\n"));
        assert!(written.contains("splash-disable=False\n"));

        let reread = GlobalConfig::load(&path, Path::new("/other"));
        assert_eq!(reread, cfg);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
