//! System prompt presets and custom prompt loading.
//!
//! The active prompt is either a named preset or free text that replaces it.

use std::fs;
use std::path::Path;

/// A named system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptPreset {
    pub name: &'static str,
    pub text: &'static str,
}

pub const DEFAULT_PRESET: &str = "Default";

pub const PRESETS: [PromptPreset; 4] = [
    PromptPreset {
        name: "Default",
        text: "You are a helpful AI assistant.",
    },
    PromptPreset {
        name: "Creative Writer",
        text: "You are a creative writer, skilled in crafting engaging stories and poems.",
    },
    PromptPreset {
        name: "Technical Expert",
        text: "You are a highly knowledgeable technical expert, providing precise and accurate information.",
    },
    PromptPreset {
        name: "Friendly Companion",
        text: "You are a friendly and empathetic companion, always ready to listen and offer support.",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown system prompt preset: {0}")]
pub struct UnknownPreset(pub String);

/// Look up a preset by name (case-insensitive; `-`/`_` match spaces).
pub fn preset(name: &str) -> Option<&'static PromptPreset> {
    let wanted = normalize(name);
    PRESETS.iter().find(|p| normalize(p.name) == wanted)
}

fn normalize(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .replace(['-', '_'], " ")
}

/// Active prompt: non-empty custom text wins, otherwise the named preset (default "Default").
pub fn resolve_system_prompt(
    preset_name: Option<&str>,
    custom: Option<&str>,
) -> Result<String, UnknownPreset> {
    if let Some(text) = custom.filter(|t| !t.trim().is_empty()) {
        return Ok(text.to_string());
    }
    let name = preset_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(DEFAULT_PRESET);
    preset(name)
        .map(|p| p.text.to_string())
        .ok_or_else(|| UnknownPreset(name.to_string()))
}

/// Load a custom prompt from a file. Returns None when missing or blank.
pub fn load_prompt_file(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(s) if !s.trim().is_empty() => Some(s.trim_end().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preset_when_nothing_given() {
        assert_eq!(
            resolve_system_prompt(None, None).unwrap(),
            "You are a helpful AI assistant."
        );
    }

    #[test]
    fn preset_lookup_is_forgiving() {
        assert_eq!(preset("technical-expert").unwrap().name, "Technical Expert");
        assert_eq!(preset(" CREATIVE WRITER ").unwrap().name, "Creative Writer");
        assert!(preset("pirate").is_none());
    }

    #[test]
    fn custom_text_overrides_preset() {
        assert_eq!(
            resolve_system_prompt(Some("Creative Writer"), Some("You are terse.")).unwrap(),
            "You are terse."
        );
        assert_eq!(
            resolve_system_prompt(Some("Friendly Companion"), Some("  ")).unwrap(),
            PRESETS[3].text
        );
    }

    #[test]
    fn unknown_preset_is_an_error() {
        assert_eq!(
            resolve_system_prompt(Some("pirate"), None),
            Err(UnknownPreset("pirate".to_string()))
        );
    }

    #[test]
    fn prompt_file_blank_or_missing_is_none() {
        let dir = std::env::temp_dir().join(format!("switchboard-prompt-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let blank = dir.join("blank.txt");
        fs::write(&blank, "  \n").unwrap();
        assert_eq!(load_prompt_file(&blank), None);
        assert_eq!(load_prompt_file(&dir.join("missing.txt")), None);
        let real = dir.join("prompt.txt");
        fs::write(&real, "You are terse.\n").unwrap();
        assert_eq!(load_prompt_file(&real).as_deref(), Some("You are terse."));
        let _ = fs::remove_dir_all(&dir);
    }
}
