//! Read-only MCP resources.

use std::path::PathBuf;

use crate::mcp::{McpResourceInfo, McpResult};

pub trait Resource: Send + Sync {
    fn definition(&self) -> McpResourceInfo;
    fn read(&self) -> McpResult<String>;
}

/// The category list, served from a side-car JSON file.
///
/// The file is read fresh on every call so edits take effect without a
/// restart. Its content is opaque to this layer; malformed JSON is passed
/// through untouched.
pub struct CategoryFile {
    path: PathBuf,
}

impl CategoryFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Resource for CategoryFile {
    fn definition(&self) -> McpResourceInfo {
        McpResourceInfo {
            uri: "expense://categories".to_string(),
            name: "categories".to_string(),
            description: "Available expense categories".to_string(),
            mime_type: "application/json".to_string(),
        }
    }

    fn read(&self) -> McpResult<String> {
        Ok(std::fs::read_to_string(&self.path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_fresh_content_on_every_call() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"categories": ["food"]}}"#).unwrap();
        file.flush().unwrap();

        let resource = CategoryFile::new(file.path());
        assert_eq!(resource.read().unwrap(), r#"{"categories": ["food"]}"#);

        // External edit is visible without re-creating the resource.
        std::fs::write(file.path(), r#"{"categories": ["food", "rent"]}"#).unwrap();
        assert_eq!(resource.read().unwrap(), r#"{"categories": ["food", "rent"]}"#);
    }

    #[test]
    fn malformed_json_is_passed_through() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json at all").unwrap();
        file.flush().unwrap();

        let resource = CategoryFile::new(file.path());
        assert_eq!(resource.read().unwrap(), "not json at all");
    }

    #[test]
    fn missing_file_is_an_error() {
        let resource = CategoryFile::new("/definitely/not/here.json");
        assert!(resource.read().is_err());
    }
}
