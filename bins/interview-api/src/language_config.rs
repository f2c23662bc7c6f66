// Supported language table
// Loads and validates judge language ids from languages.json

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Language id as understood by the remote judge
    pub id: u32,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LanguagesFile {
    languages: Vec<LanguageConfig>,
}

/// Registry of languages the service will forward to the judge
/// Submissions with any other language id are rejected up front
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    languages: BTreeMap<u32, LanguageConfig>,
}

impl LanguageRegistry {
    /// Load language configuration from languages.json
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| format!("Failed to read languages.json: {}", e))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, String> {
        let config: LanguagesFile = serde_json::from_str(content)
            .map_err(|e| format!("Failed to parse languages.json: {}", e))?;

        let mut languages = BTreeMap::new();
        for lang in config.languages {
            if lang.name.trim().is_empty() {
                return Err(format!("Language id {} has an empty name", lang.id));
            }
            if languages.contains_key(&lang.id) {
                return Err(format!("Duplicate language id {} in languages.json", lang.id));
            }
            languages.insert(lang.id, lang);
        }

        if languages.is_empty() {
            return Err("No languages configured in languages.json".to_string());
        }

        Ok(Self { languages })
    }

    /// Built-in table used when no languages.json is present
    pub fn builtin() -> Self {
        let table = [
            (50, "c", "GCC 9.2.0"),
            (54, "cpp", "GCC 9.2.0"),
            (60, "go", "1.13.5"),
            (62, "java", "OpenJDK 13.0.1"),
            (63, "javascript", "Node.js 12.14.0"),
            (71, "python", "3.8.1"),
            (73, "rust", "1.40.0"),
            (74, "typescript", "3.7.4"),
        ];
        let languages = table
            .into_iter()
            .map(|(id, name, version)| {
                (
                    id,
                    LanguageConfig {
                        id,
                        name: name.to_string(),
                        version: version.to_string(),
                    },
                )
            })
            .collect();
        Self { languages }
    }

    /// Check if a language id is enabled
    pub fn is_enabled(&self, language_id: u32) -> bool {
        self.languages.contains_key(&language_id)
    }

    pub fn get(&self, language_id: u32) -> Option<&LanguageConfig> {
        self.languages.get(&language_id)
    }

    /// All enabled language ids, ascending
    pub fn enabled_ids(&self) -> Vec<u32> {
        self.languages.keys().copied().collect()
    }
}
