use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumString};

/// Stable external identifier for a content object, independent of any
/// catalog's internal document id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Address {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// The unit of catalog ownership: a user, a dynamic group, or a book corpus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum EntityId {
    User(String),
    Group(String),
    Book(String),
}

impl EntityId {
    pub fn user(name: impl Into<String>) -> Self {
        Self::User(name.into())
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::Group(name.into())
    }

    pub fn book(name: impl Into<String>) -> Self {
        Self::Book(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Self::User(n) | Self::Group(n) | Self::Book(n) => n,
        }
    }

    /// Stable key used for catalog registry lookups and broker routing
    pub fn key(&self) -> String {
        match self {
            Self::User(n) => format!("user:{}", n),
            Self::Group(n) => format!("group:{}", n),
            Self::Book(n) => format!("book:{}", n),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Closed enumeration of indexable content kinds
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Note,
    Highlight,
    Message,
    ForumPost,
    /// Static book content
    Page,
}

/// A canonical content object as returned by the object resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentObject {
    /// Stable external identifier
    pub address: Address,

    /// Content kind
    pub kind: ContentKind,

    /// Creating user
    pub creator: String,

    /// Containing unit (section, thread, room)
    pub container_id: Option<String>,

    /// Title, present for forum posts and pages
    pub title: Option<String>,

    /// Free-text body
    pub body: String,

    /// User-assigned tags
    pub tags: Vec<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub last_modified: DateTime<Utc>,
}

impl ContentObject {
    pub fn new(
        address: impl Into<Address>,
        kind: ContentKind,
        creator: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            address: address.into(),
            kind,
            creator: creator.into(),
            container_id: None,
            title: None,
            body: body.into(),
            tags: Vec::new(),
            created_at: now,
            last_modified: now,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_container(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = Some(container_id.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Searchable text field names
pub const FIELD_CONTENT: &str = "content";
pub const FIELD_TITLE: &str = "title";
pub const FIELD_TAGS: &str = "tags";

type ExtractFn = fn(&ContentObject) -> Vec<(&'static str, String)>;

fn extract_body(obj: &ContentObject) -> Vec<(&'static str, String)> {
    vec![(FIELD_CONTENT, obj.body.clone())]
}

fn extract_titled(obj: &ContentObject) -> Vec<(&'static str, String)> {
    let mut fields = extract_body(obj);
    if let Some(ref title) = obj.title {
        fields.push((FIELD_TITLE, title.clone()));
    }
    fields
}

fn extract_post(obj: &ContentObject) -> Vec<(&'static str, String)> {
    let mut fields = extract_titled(obj);
    if !obj.tags.is_empty() {
        fields.push((FIELD_TAGS, obj.tags.join(" ")));
    }
    fields
}

/// Static lookup of content kind to searchable-field extractor
static EXTRACTORS: &[(ContentKind, ExtractFn)] = &[
    (ContentKind::Note, extract_body),
    (ContentKind::Highlight, extract_body),
    (ContentKind::Message, extract_body),
    (ContentKind::ForumPost, extract_post),
    (ContentKind::Page, extract_titled),
];

/// Searchable (field, text) pairs for an object of the given kind
pub fn searchable_fields(kind: ContentKind, obj: &ContentObject) -> Vec<(&'static str, String)> {
    EXTRACTORS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, f)| f(obj))
        .unwrap_or_default()
}

/// Field names queried for free-text search against the given kind
pub fn search_fields_for(kind: ContentKind) -> &'static [&'static str] {
    match kind {
        ContentKind::ForumPost => &[FIELD_CONTENT, FIELD_TITLE, FIELD_TAGS],
        ContentKind::Page => &[FIELD_CONTENT, FIELD_TITLE],
        _ => &[FIELD_CONTENT],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_content_kind_parsing() {
        assert_eq!(ContentKind::from_str("note").unwrap(), ContentKind::Note);
        assert_eq!(
            ContentKind::from_str("forum_post").unwrap(),
            ContentKind::ForumPost
        );
        assert!(ContentKind::from_str("redaction").is_err());
    }

    #[test]
    fn test_entity_keys_are_distinct() {
        assert_ne!(EntityId::user("alice").key(), EntityId::group("alice").key());
        assert_eq!(EntityId::book("physics").key(), "book:physics");
    }

    #[test]
    fn test_forum_post_extracts_title_and_tags() {
        let obj = ContentObject::new("tag:post1", ContentKind::ForumPost, "bob", "body text")
            .with_title("A Title")
            .with_tags(vec!["rust".to_string(), "search".to_string()]);

        let fields = searchable_fields(ContentKind::ForumPost, &obj);
        let names: Vec<&str> = fields.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec![FIELD_CONTENT, FIELD_TITLE, FIELD_TAGS]);
    }

    #[test]
    fn test_note_extracts_body_only() {
        let obj = ContentObject::new("tag:n1", ContentKind::Note, "bob", "just a note")
            .with_title("ignored");
        let fields = searchable_fields(ContentKind::Note, &obj);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].0, FIELD_CONTENT);
    }
}
