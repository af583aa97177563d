use std::collections::HashMap;
use std::path::Path;

use ragchat_core::{Chunk, RagError};

/// Splits text into word-aligned chunks by estimated token count (~4 chars
/// per token), carrying `chunk_overlap` tokens of trailing words into the
/// next chunk.
#[derive(Debug, Clone)]
pub struct TokenSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TokenSplitter {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap: 0,
        }
    }

    pub fn with_chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = overlap;
        self
    }

    fn estimate_tokens(text: &str) -> usize {
        (text.len() / 4).max(1)
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for word in text.split_whitespace() {
            current.push(word);
            if current.len() > 1 && Self::estimate_tokens(&current.join(" ")) > self.chunk_size {
                current.pop();
                chunks.push(current.join(" "));

                if self.chunk_overlap == 0 {
                    current.clear();
                } else {
                    while current.len() > 1
                        && Self::estimate_tokens(&current.join(" ")) > self.chunk_overlap
                    {
                        current.remove(0);
                    }
                }
                current.push(word);
            }
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }
        chunks
    }
}

/// A parsed source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub file_name: String,
    pub text: String,
}

impl Document {
    pub fn new(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            text: text.into(),
        }
    }

    /// Read a UTF-8 text file. The file name is the last path component.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, RagError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            RagError::Validation(format!("cannot read {}: {e}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(file_name, text))
    }
}

/// Chunks per ingested file, keyed by file name.
///
/// Each `store_documents` call selects the files the next engine is built
/// over. Files seen before are not split again.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    splitter: TokenSplitter,
    chunks_by_file: HashMap<String, Vec<Chunk>>,
    active_files: Vec<String>,
}

impl ChunkStore {
    pub fn new(splitter: TokenSplitter) -> Self {
        Self {
            splitter,
            chunks_by_file: HashMap::new(),
            active_files: Vec::new(),
        }
    }

    /// Split and store `documents`, making them the active selection.
    /// Returns the number of chunks now active.
    pub fn store_documents(&mut self, documents: Vec<Document>) -> usize {
        self.active_files.clear();

        for document in documents {
            let file_name = document.file_name;
            if !self.active_files.contains(&file_name) {
                self.active_files.push(file_name.clone());
            }
            if self.chunks_by_file.contains_key(&file_name) {
                tracing::debug!(file = %file_name, "file already ingested");
                continue;
            }

            let chunks: Vec<Chunk> = self
                .splitter
                .split_text(&document.text)
                .into_iter()
                .enumerate()
                .map(|(i, text)| {
                    Chunk::new(format!("{file_name}#{i}"), text)
                        .with_source(file_name.clone())
                        .with_file_name(file_name.clone())
                })
                .collect();
            tracing::info!(file = %file_name, chunks = chunks.len(), "ingested file");
            self.chunks_by_file.insert(file_name, chunks);
        }

        self.ingested_chunks().len()
    }

    /// Store pre-split chunks under `file_name` and add it to the active
    /// selection. Replaces chunks previously stored for that file.
    pub fn store_chunks(&mut self, file_name: impl Into<String>, chunks: Vec<Chunk>) {
        let file_name = file_name.into();
        if !self.active_files.contains(&file_name) {
            self.active_files.push(file_name.clone());
        }
        self.chunks_by_file.insert(file_name, chunks);
    }

    /// Chunks of the active files, in selection order.
    pub fn ingested_chunks(&self) -> Vec<Chunk> {
        self.active_files
            .iter()
            .filter_map(|file| self.chunks_by_file.get(file))
            .flatten()
            .cloned()
            .collect()
    }

    pub fn active_files(&self) -> &[String] {
        &self.active_files
    }

    pub fn has_chunks(&self) -> bool {
        self.chunks_by_file.values().any(|chunks| !chunks.is_empty())
    }

    pub fn reset(&mut self) {
        self.chunks_by_file.clear();
        self.active_files.clear();
    }
}
