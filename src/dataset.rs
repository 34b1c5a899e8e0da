//! Columnar corpus dataset consumed by the retriever builder.

use crate::chunk::chunk_text;
use crate::models::{Corpus, Passage};

/// Two equal-length columns, `title` and `text`, one row per document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusDataset {
    titles: Vec<String>,
    texts: Vec<String>,
}

impl CorpusDataset {
    /// Build from a (cleaned) corpus. Never fails; an empty corpus gives an
    /// empty dataset.
    pub fn from_corpus(corpus: &Corpus) -> Self {
        let (titles, texts) = corpus
            .iter()
            .map(|(title, text)| (title.to_string(), text.to_string()))
            .unzip();
        Self { titles, texts }
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Look up a column by name (`"title"` or `"text"`).
    pub fn column(&self, name: &str) -> Option<&[String]> {
        match name {
            "title" => Some(&self.titles),
            "text" => Some(&self.texts),
            _ => None,
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = (&str, &str)> {
        self.titles
            .iter()
            .zip(self.texts.iter())
            .map(|(t, x)| (t.as_str(), x.as_str()))
    }

    /// Chunk every row into retrievable passages.
    pub fn passages(&self, max_tokens: usize) -> Vec<Passage> {
        self.rows()
            .flat_map(|(title, text)| chunk_text(title, text, max_tokens))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_corpus_gives_empty_dataset() {
        let dataset = CorpusDataset::from_corpus(&Corpus::new());
        assert!(dataset.is_empty());
        assert_eq!(dataset.column("text").map(<[String]>::len), Some(0));
        assert!(dataset.passages(100).is_empty());
    }

    #[test]
    fn test_columns_align() {
        let mut corpus = Corpus::new();
        corpus.insert("Genesis", "In the beginning");
        corpus.insert("Exodus", "These are the names");
        let dataset = CorpusDataset::from_corpus(&corpus);

        assert_eq!(dataset.len(), 2);
        let titles = dataset.column("title").unwrap();
        let texts = dataset.column("text").unwrap();
        assert_eq!(titles.len(), texts.len());
        assert_eq!(corpus.get(&titles[0]), Some(texts[0].as_str()));
        assert!(dataset.column("embedding").is_none());
    }

    #[test]
    fn test_blank_rows_produce_no_passages() {
        let mut corpus = Corpus::new();
        corpus.insert("Genesis", "In the beginning");
        corpus.insert("Hebrew Only", "   ");
        let passages = CorpusDataset::from_corpus(&corpus).passages(100);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].title, "Genesis");
    }
}
