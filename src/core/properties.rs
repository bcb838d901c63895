use crate::utils::error::{Result, ServerSmithError};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Line-preserving editor for `server.properties`.
///
/// Comments, blank lines and ordering survive a load/save cycle; only the
/// lines of keys that were `set` are rewritten.
#[derive(Debug, Clone)]
pub struct PropertiesFile {
    path: PathBuf,
    lines: Vec<String>,
    key_line_index: HashMap<String, usize>,
}

impl PropertiesFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut file = Self {
            path: path.into(),
            lines: Vec::new(),
            key_line_index: HashMap::new(),
        };
        if file.path.exists() {
            file.load()?;
        }
        Ok(file)
    }

    pub fn load(&mut self) -> Result<()> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            tracing::error!("Failed to load properties: {}: {}", self.path.display(), e);
            e
        })?;

        self.lines.clear();
        self.key_line_index.clear();
        for (index, line) in content.lines().enumerate() {
            if let Some(key) = parse_key(line) {
                self.key_line_index.insert(key.to_string(), index);
            }
            self.lines.push(line.to_string());
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let index = *self.key_line_index.get(key)?;
        let line = &self.lines[index];
        line.split_once('=').map(|(_, value)| value.trim())
    }

    /// Updates the key in place or appends it. Line breaks in the value are
    /// written as `\n` and `\r` escapes so one property stays on one line.
    pub fn set(&mut self, key: &str, value: &str) {
        let value = value.replace('\r', "\\r").replace('\n', "\\n");
        let new_line = format!("{}={}", key, value);
        match self.key_line_index.get(key) {
            Some(&index) => self.lines[index] = new_line,
            None => {
                self.lines.push(new_line);
                self.key_line_index
                    .insert(key.to_string(), self.lines.len() - 1);
            }
        }
    }

    /// Key/value pairs in file order.
    pub fn entries(&self) -> Vec<(&str, &str)> {
        let mut indexed: Vec<(&usize, &String)> =
            self.key_line_index.iter().map(|(k, i)| (i, k)).collect();
        indexed.sort();
        indexed
            .into_iter()
            .filter_map(|(_, key)| self.get(key).map(|value| (key.as_str(), value)))
            .collect()
    }

    /// Writes through a `.tmp` sibling and renames it into place.
    pub fn save(&self) -> Result<()> {
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let mut content = self.lines.join("\n");
        content.push('\n');

        std::fs::write(&tmp_path, content)
            .and_then(|_| std::fs::rename(&tmp_path, &self.path))
            .map_err(|e| {
                tracing::error!("Failed to save properties to {}: {}", self.path.display(), e);
                ServerSmithError::IoError(e)
            })
    }
}

fn parse_key(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
        return None;
    }
    match trimmed.find('=') {
        Some(eq) if eq > 0 => Some(trimmed[..eq].trim()),
        _ => None,
    }
}

macro_rules! keyword_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const VALUES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ServerSmithError;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(ServerSmithError::InvalidConfigValueError {
                        field: stringify!($name).to_lowercase(),
                        value: other.to_string(),
                        reason: format!("Expected one of: {}", Self::VALUES.join(", ")),
                    }),
                }
            }
        }
    };
}

keyword_enum!(Difficulty {
    Peaceful => "peaceful",
    Easy => "easy",
    Normal => "normal",
    Hard => "hard",
});

keyword_enum!(GameMode {
    Survival => "survival",
    Creative => "creative",
    Adventure => "adventure",
    Spectator => "spectator",
});

pub const MOTD_FORMAT_CODES: [&str; 22] = [
    "&0", "&1", "&2", "&3", "&4", "&5", "&6", "&7", "&8", "&9", "&a", "&b", "&c", "&d", "&e",
    "&f", "&k", "&l", "&m", "&n", "&o", "&r",
];

/// Rewrites `&x` formatting codes as the `§x` codes the server renders.
pub fn motd_to_section_codes(motd: &str) -> String {
    let mut out = String::with_capacity(motd.len());
    let mut chars = motd.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '&' {
            if let Some(&next) = chars.peek() {
                let code = format!("&{}", next);
                if MOTD_FORMAT_CODES.contains(&code.as_str()) {
                    out.push('§');
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

/// The settings exposed by the instance editor.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSettings {
    pub server_port: Option<u16>,
    pub max_players: Option<u32>,
    pub online_mode: bool,
    pub pvp: bool,
    pub white_list: bool,
    pub difficulty: Option<Difficulty>,
    pub gamemode: Option<GameMode>,
    pub motd: String,
}

impl ServerSettings {
    /// Missing or unparseable values read as unset/false.
    pub fn read(props: &PropertiesFile) -> Self {
        let flag = |key: &str| props.get(key).map(|v| v.eq_ignore_ascii_case("true")).unwrap_or(false);

        Self {
            server_port: props.get("server-port").and_then(|v| v.parse().ok()),
            max_players: props.get("max-players").and_then(|v| v.parse().ok()),
            online_mode: flag("online-mode"),
            pvp: flag("pvp"),
            white_list: flag("white-list"),
            difficulty: props.get("difficulty").and_then(|v| v.parse().ok()),
            gamemode: props.get("gamemode").and_then(|v| v.parse().ok()),
            motd: props.get("motd").unwrap_or_default().to_string(),
        }
    }
}

/// Checks values for the keys the editor understands; other keys pass.
pub fn validate_property(key: &str, value: &str) -> Result<()> {
    let invalid = |reason: &str| ServerSmithError::InvalidConfigValueError {
        field: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    };

    if value.contains(['\n', '\r']) {
        return Err(invalid("Value must fit on a single line"));
    }

    match key {
        "server-port" => match value.trim().parse::<u16>() {
            Ok(port) if port > 0 => Ok(()),
            _ => Err(invalid("Port must be a number between 1 and 65535")),
        },
        "max-players" => value
            .trim()
            .parse::<u32>()
            .map(|_| ())
            .map_err(|_| invalid("Max players must be a non-negative number")),
        "online-mode" | "pvp" | "white-list" => match value.trim() {
            "true" | "false" => Ok(()),
            _ => Err(invalid("Value must be true or false")),
        },
        "difficulty" => value.parse::<Difficulty>().map(|_| ()),
        "gamemode" => value.parse::<GameMode>().map(|_| ()),
        _ => Ok(()),
    }
}
