//! YouTube video category catalog.
//!
//! Loaded once from a `videoCategories.list` response saved to disk and
//! passed by reference to whoever needs a category id.

use crate::error::UploaderError;
use serde::Deserialize;
use std::path::Path;

/// A platform category such as "Science & Technology"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    pub title: String,
    pub assignable: bool,
    pub channel_id: String,
}

/// Categories in the order the API listed them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryCatalog {
    pub kind: String,
    pub etag: String,
    categories: Vec<Category>,
}

#[derive(Deserialize)]
struct CategoryListResponse {
    #[serde(default)]
    kind: String,
    #[serde(default)]
    etag: String,
    items: Vec<CategoryItem>,
}

#[derive(Deserialize)]
struct CategoryItem {
    id: String,
    snippet: CategorySnippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategorySnippet {
    title: String,
    #[serde(default)]
    assignable: bool,
    #[serde(default)]
    channel_id: String,
}

impl CategoryCatalog {
    pub fn load(path: &Path) -> Result<Self, UploaderError> {
        let content = std::fs::read_to_string(path).map_err(|e| UploaderError::ConfigLoad {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let catalog = Self::from_json(&content).map_err(|reason| UploaderError::ConfigLoad {
            path: path.display().to_string(),
            reason,
        })?;

        tracing::debug!(
            path = %path.display(),
            categories = catalog.len(),
            "Loaded category catalog"
        );

        Ok(catalog)
    }

    pub fn from_json(content: &str) -> Result<Self, String> {
        let response: CategoryListResponse =
            serde_json::from_str(content).map_err(|e| e.to_string())?;

        let categories = response
            .items
            .into_iter()
            .map(|item| Category {
                id: item.id,
                title: item.snippet.title,
                assignable: item.snippet.assignable,
                channel_id: item.snippet.channel_id,
            })
            .collect();

        let catalog = Self {
            kind: response.kind,
            etag: response.etag,
            categories,
        };
        if catalog.is_empty() {
            return Err("catalog lists no categories".to_string());
        }

        Ok(catalog)
    }

    /// First category whose title equals `name`, ignoring case
    pub fn get_by_name(&self, name: &str) -> Option<&Category> {
        let wanted = name.to_lowercase();
        self.categories
            .iter()
            .find(|category| category.title.to_lowercase() == wanted)
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}
