//! Blog feed entries.

use serde::{Deserialize, Serialize};

/// One entry of the static JSON blog index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    pub title: String,
    pub summary: String,
    pub permalink: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl BlogPost {
    /// Text used for keyword tag inference: the body when present, else the title.
    pub fn inference_text(&self) -> &str {
        self.content
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(&self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feed_with_optional_fields() {
        let json = r#"[
            {"title": "A", "summary": "s", "permalink": "https://x/a/", "date": "2025-01-02", "tags": ["Rust"]},
            {"title": "B", "summary": "s", "permalink": "https://x/b/"}
        ]"#;
        let posts: Vec<BlogPost> = serde_json::from_str(json).unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].tags.as_deref(), Some(&["Rust".to_string()][..]));
        assert!(posts[1].date.is_none());
        assert!(posts[1].tags.is_none());
    }

    #[test]
    fn test_inference_text_prefers_content() {
        let mut post = BlogPost {
            title: "Title".to_string(),
            summary: String::new(),
            permalink: String::new(),
            date: None,
            tags: None,
            content: Some("Body".to_string()),
        };
        assert_eq!(post.inference_text(), "Body");
        post.content = None;
        assert_eq!(post.inference_text(), "Title");
    }
}
