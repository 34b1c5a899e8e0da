//! Character-level text cleaning.
//!
//! Removes every character outside ASCII letters, digits, and whitespace.
//! Whitespace is kept as-is, so paragraph breaks survive for the chunker.

use regex::Regex;

use crate::config::PreprocessConfig;
use crate::models::Corpus;

const DISALLOWED: &str = r"[^a-zA-Z0-9\s]";
const MARKUP: &str = r"<[^>]*>";

#[derive(Debug, Clone)]
pub struct TextPreprocessor {
    pattern: Regex,
    markup: Option<Regex>,
}

impl TextPreprocessor {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(DISALLOWED).expect("static pattern compiles"),
            markup: None,
        }
    }

    /// Also drop `<...>` tags before filtering, so `<b>word</b>` becomes
    /// `word` rather than `bwordb`.
    pub fn with_markup_stripping(mut self) -> Self {
        self.markup = Some(Regex::new(MARKUP).expect("static pattern compiles"));
        self
    }

    pub fn from_config(config: &PreprocessConfig) -> Self {
        let pre = Self::new();
        if config.strip_markup {
            pre.with_markup_stripping()
        } else {
            pre
        }
    }

    pub fn clean(&self, text: &str) -> String {
        match &self.markup {
            Some(markup) => {
                let stripped = markup.replace_all(text, "");
                self.pattern.replace_all(&stripped, "").into_owned()
            }
            None => self.pattern.replace_all(text, "").into_owned(),
        }
    }

    /// Clean every text in the corpus. Titles are left untouched.
    pub fn clean_corpus(&self, corpus: &Corpus) -> Corpus {
        corpus
            .iter()
            .map(|(title, text)| (title.to_string(), self.clean(text)))
            .collect()
    }
}

impl Default for TextPreprocessor {
    fn default() -> Self {
        Self::new()
    }
}
