// src/common/i18n.rs

use std::collections::HashMap;
use std::sync::OnceLock;

const DEFAULT_LANG: &str = "en";

// Catálogos embutidos no binário
const CATALOGS: &[(&str, &str)] = &[
    ("en", include_str!("../../locales/en.json")),
    ("hi", include_str!("../../locales/hi.json")),
];

/// Mensagens de erro por idioma. Sem tradução, cai para inglês e depois para a própria chave.
#[derive(Debug, Clone, Default)]
pub struct I18nStore {
    messages: HashMap<String, HashMap<String, String>>,
}

impl I18nStore {
    pub fn load() -> anyhow::Result<Self> {
        let mut messages = HashMap::new();
        for (lang, raw) in CATALOGS {
            let catalog: HashMap<String, String> = serde_json::from_str(raw)
                .map_err(|e| anyhow::anyhow!("Catálogo '{}' inválido: {}", lang, e))?;
            messages.insert(lang.to_string(), catalog);
        }
        Ok(Self { messages })
    }

    pub fn global() -> &'static I18nStore {
        static STORE: OnceLock<I18nStore> = OnceLock::new();
        STORE.get_or_init(|| Self::load().unwrap_or_default())
    }

    pub fn translate(&self, lang: &str, key: &str) -> String {
        self.messages
            .get(lang)
            .and_then(|catalog| catalog.get(key))
            .or_else(|| self.messages.get(DEFAULT_LANG).and_then(|c| c.get(key)))
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogs_share_the_same_keys() {
        let store = I18nStore::load().unwrap();
        let en = &store.messages["en"];
        let hi = &store.messages["hi"];
        let mut missing: Vec<_> = en.keys().filter(|k| !hi.contains_key(*k)).collect();
        missing.sort();
        assert!(missing.is_empty(), "hi catalog is missing {:?}", missing);
    }

    #[test]
    fn every_negotiable_language_has_a_catalog() {
        let store = I18nStore::load().unwrap();
        for lang in crate::middleware::i18n::SUPPORTED_LANGUAGES {
            assert!(store.messages.contains_key(lang), "sem catálogo para {}", lang);
        }
    }

    #[test]
    fn falls_back_to_english_then_key() {
        let store = I18nStore::load().unwrap();
        assert_eq!(store.translate("fr", "lead_not_found"), store.translate("en", "lead_not_found"));
        assert_eq!(store.translate("en", "no_such_key"), "no_such_key");
    }
}
