pub mod error;
pub mod info;
mod structural;

pub use error::ParseError;
pub use structural::byte_offset_to_line;

use std::path::PathBuf;

use crate::document::Document;

/// Block Extractor entry point.
pub struct Parser {
    path: PathBuf,
    source: String,
    language: String,
    file_id: usize,
}

impl Parser {
    /// `language` is the fence language the backend executes; fences in any
    /// other language are kept as prose.
    pub fn new(path: impl Into<PathBuf>, source: String, language: impl Into<String>) -> Self {
        Parser {
            path: path.into(),
            source,
            language: language.into(),
            file_id: 0,
        }
    }

    /// Set the codespan-reporting file ID carried by parse errors.
    pub fn with_file_id(mut self, file_id: usize) -> Self {
        self.file_id = file_id;
        self
    }

    /// Parse the source into a Document.
    pub fn parse(self) -> Result<Document, Vec<ParseError>> {
        let segments =
            structural::extract_segments(&self.source, &self.path, &self.language, self.file_id)?;
        Ok(Document {
            path: self.path,
            source: self.source,
            segments,
        })
    }
}
