//! Gateway response code decoding.
//!
//! Gateway codes are eight ASCII digits split into three tiers, each looked
//! up independently in the dataset:
//!
//! ```text
//!   0 2   0 0 2   0 0 4
//!   ───   ─────   ─────
//!  state  module  parameter
//! ```
//!
//! The dataset declares the languages it supports. Asking for any other
//! language is an error, never a silent fallback.
//!
//! ```
//! use gateway_bridge::codes::CodeMessageCatalog;
//!
//! let catalog = CodeMessageCatalog::bundled().unwrap();
//! let message = catalog.decode("02002004", "en").unwrap();
//!
//! assert_eq!(message.state.description, "Refused");
//! assert_eq!(message.module.description, "Card");
//! assert_eq!(message.parameter.description, "Card expiry");
//! ```

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock},
};

use serde::{Deserialize, Serialize};

use crate::error::CodeMessageError;

/// Language used when the caller does not name one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Digits in a full code.
pub const CODE_LENGTH: usize = 8;

const BUNDLED_DATASET: &str = include_str!("../data/code_messages.json");

static BUNDLED: LazyLock<Result<Arc<CodeMessageCatalog>, CodeMessageError>> =
    LazyLock::new(|| CodeMessageCatalog::from_json_str(BUNDLED_DATASET).map(Arc::new));

/// Description and message of one tier, in one language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageText {
    /// Short label.
    pub description: String,
    /// Full sentence.
    pub message: String,
}

/// Decoded code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeMessage {
    /// The eight-digit code.
    pub code: String,
    /// Language of the texts.
    pub language: String,
    /// Digits 1-2.
    pub state: MessageText,
    /// Digits 3-5.
    pub module: MessageText,
    /// Digits 6-8.
    pub parameter: MessageText,
}

type Tier = HashMap<String, HashMap<String, MessageText>>;

#[derive(Deserialize)]
struct Dataset {
    languages: Vec<String>,
    states: Tier,
    modules: Tier,
    parameters: Tier,
}

/// Immutable three-tier code table.
#[derive(Debug, Clone)]
pub struct CodeMessageCatalog {
    languages: Vec<String>,
    states: Tier,
    modules: Tier,
    parameters: Tier,
}

impl CodeMessageCatalog {
    /// The dataset shipped with the crate, parsed once per process.
    ///
    /// # Errors
    ///
    /// Returns [`CodeMessageError::Dataset`] if the bundled dataset is invalid.
    pub fn bundled() -> Result<Arc<Self>, CodeMessageError> {
        BUNDLED.as_ref().map(Arc::clone).map_err(Clone::clone)
    }

    /// Parses and checks a dataset.
    ///
    /// Every entry must carry text for every declared language, and sub-code
    /// keys must have the width of their tier.
    ///
    /// # Errors
    ///
    /// Returns [`CodeMessageError::Dataset`] describing the first problem.
    pub fn from_json_str(json: &str) -> Result<Self, CodeMessageError> {
        let dataset: Dataset = serde_json::from_str(json)
            .map_err(|e| CodeMessageError::Dataset(e.to_string()))?;

        if dataset.languages.is_empty() {
            return Err(CodeMessageError::Dataset("no languages declared".to_owned()));
        }
        for (name, tier, width) in [
            ("state", &dataset.states, 2),
            ("module", &dataset.modules, 3),
            ("parameter", &dataset.parameters, 3),
        ] {
            check_tier(name, tier, width, &dataset.languages)?;
        }

        Ok(Self {
            languages: dataset.languages,
            states: dataset.states,
            modules: dataset.modules,
            parameters: dataset.parameters,
        })
    }

    /// Languages the dataset supports.
    #[must_use]
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Returns true if `language` is supported.
    #[must_use]
    pub fn supports(&self, language: &str) -> bool {
        self.languages.iter().any(|supported| supported == language)
    }

    /// Decodes `code` into `language` texts.
    ///
    /// # Errors
    ///
    /// - [`CodeMessageError::InvalidFormat`] if `code` is not exactly 8 ASCII digits
    /// - [`CodeMessageError::UnsupportedLanguage`] if the dataset lacks `language`
    /// - [`CodeMessageError::UnknownCode`] naming the first tier with no entry
    pub fn decode(&self, code: &str, language: &str) -> Result<CodeMessage, CodeMessageError> {
        if code.len() != CODE_LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodeMessageError::InvalidFormat { code: code.to_owned() });
        }
        if !self.supports(language) {
            return Err(CodeMessageError::UnsupportedLanguage { language: language.to_owned() });
        }

        let lookup = |tier: &'static str, table: &Tier, sub_code: &str| {
            table
                .get(sub_code)
                .and_then(|texts| texts.get(language))
                .cloned()
                .ok_or_else(|| CodeMessageError::UnknownCode {
                    code: code.to_owned(),
                    tier,
                    sub_code: sub_code.to_owned(),
                })
        };

        Ok(CodeMessage {
            code: code.to_owned(),
            language: language.to_owned(),
            state: lookup("state", &self.states, &code[..2])?,
            module: lookup("module", &self.modules, &code[2..5])?,
            parameter: lookup("parameter", &self.parameters, &code[5..])?,
        })
    }
}

fn check_tier(
    name: &str,
    tier: &Tier,
    width: usize,
    languages: &[String],
) -> Result<(), CodeMessageError> {
    for (sub_code, texts) in tier {
        if sub_code.len() != width || !sub_code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodeMessageError::Dataset(format!(
                "{name} key '{sub_code}' must be {width} digits"
            )));
        }
        if let Some(language) = languages.iter().find(|language| !texts.contains_key(*language)) {
            return Err(CodeMessageError::Dataset(format!(
                "{name} '{sub_code}' has no '{language}' text"
            )));
        }
    }
    Ok(())
}
