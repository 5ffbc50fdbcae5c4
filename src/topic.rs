//! Topic records as supplied by the host forum.
//!
//! Every field tolerates being absent or `null` in the incoming JSON so that
//! projection never has to deal with a half-deserialized record. Mutation goes
//! through the owned setters below; nothing else in the crate assigns topic
//! fields directly.
use serde::{Deserialize, Deserializer, Serialize};

/// Forum-wide topic identifier.
pub type TopicId = u64;

/// Poster description marker identifying the topic's opening author.
const ORIGINAL_POSTER_MARKER: &str = "Original Poster";

// ============================================================================
// Deserialization Helpers
// ============================================================================

/// Treat an explicit `null` the same as a missing field.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn nullable_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Data Types
// ============================================================================

/// Category descriptor attached to a topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Category {
    #[serde(deserialize_with = "nullable")]
    pub id: u64,
    #[serde(deserialize_with = "nullable")]
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub slug: String,
}

/// User summary embedded in a poster entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PosterUser {
    #[serde(deserialize_with = "nullable")]
    pub username: String,
    pub name: Option<String>,
    /// Avatar URL with a `{size}` placeholder.
    pub avatar_template: Option<String>,
}

/// One entry of a topic's poster list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Poster {
    /// Free-form role text, e.g. "Original Poster, Most Recent Poster".
    #[serde(deserialize_with = "nullable")]
    pub description: String,
    pub user: Option<PosterUser>,
}

impl Poster {
    pub fn is_original_poster(&self) -> bool {
        self.description.contains(ORIGINAL_POSTER_MARKER)
    }
}

/// Thumbnail descriptor; only the URL is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thumbnail {
    #[serde(deserialize_with = "nullable")]
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// A discussion topic as held by the host collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topic {
    #[serde(deserialize_with = "nullable")]
    pub id: TopicId,
    #[serde(deserialize_with = "nullable")]
    pub title: String,
    #[serde(deserialize_with = "nullable")]
    pub slug: String,
    #[serde(deserialize_with = "nullable")]
    pub excerpt: String,
    pub category: Option<Category>,
    #[serde(deserialize_with = "nullable")]
    pub posters: Vec<Poster>,
    #[serde(deserialize_with = "nullable")]
    pub last_poster_username: String,
    pub image_url: Option<String>,
    #[serde(deserialize_with = "nullable")]
    pub thumbnails: Vec<Thumbnail>,
    #[serde(deserialize_with = "nullable")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub vote_count: u32,
    #[serde(deserialize_with = "nullable")]
    pub user_voted: bool,
    #[serde(deserialize_with = "nullable")]
    pub closed: bool,
    #[serde(deserialize_with = "nullable")]
    pub archived: bool,
    #[serde(default = "default_true", deserialize_with = "nullable_true")]
    pub visible: bool,
    #[serde(deserialize_with = "nullable")]
    pub pinned: bool,
    /// Mirror of the selection store, kept for hosts that render from the record.
    #[serde(skip)]
    pub selected: bool,
}

impl Default for Topic {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            slug: String::new(),
            excerpt: String::new(),
            category: None,
            posters: Vec::new(),
            last_poster_username: String::new(),
            image_url: None,
            thumbnails: Vec::new(),
            tags: Vec::new(),
            vote_count: 0,
            user_voted: false,
            closed: false,
            archived: false,
            visible: true,
            pinned: false,
            selected: false,
        }
    }
}

/// Status flags changeable through the single-topic status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Closed,
    Archived,
    Visible,
    Pinned,
}

impl TopicStatus {
    /// Name sent as the `status` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            TopicStatus::Closed => "closed",
            TopicStatus::Archived => "archived",
            TopicStatus::Visible => "visible",
            TopicStatus::Pinned => "pinned",
        }
    }
}

// ============================================================================
// Owned Field Updates
// ============================================================================

impl Topic {
    /// The poster flagged as original author, else the first poster.
    pub fn opening_poster(&self) -> Option<&Poster> {
        self.posters
            .iter()
            .find(|p| p.is_original_poster())
            .or_else(|| self.posters.first())
    }

    /// User of [`Topic::opening_poster`], if the entry carries one.
    pub fn opening_user(&self) -> Option<&PosterUser> {
        self.opening_poster().and_then(|p| p.user.as_ref())
    }

    pub fn set_voted(&mut self, voted: bool) {
        self.user_voted = voted;
    }

    pub fn set_vote_count(&mut self, count: u32) {
        self.vote_count = count;
    }

    pub fn set_closed(&mut self, closed: bool) {
        self.closed = closed;
    }

    pub fn set_archived(&mut self, archived: bool) {
        self.archived = archived;
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn set_pinned(&mut self, pinned: bool) {
        self.pinned = pinned;
    }

    pub fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    /// Current value of the flag named by `status`.
    pub fn status(&self, status: TopicStatus) -> bool {
        match status {
            TopicStatus::Closed => self.closed,
            TopicStatus::Archived => self.archived,
            TopicStatus::Visible => self.visible,
            TopicStatus::Pinned => self.pinned,
        }
    }

    /// Route a status change to the matching setter.
    pub fn apply_status(&mut self, status: TopicStatus, enabled: bool) {
        match status {
            TopicStatus::Closed => self.set_closed(enabled),
            TopicStatus::Archived => self.set_archived(enabled),
            TopicStatus::Visible => self.set_visible(enabled),
            TopicStatus::Pinned => self.set_pinned(enabled),
        }
    }

    /// Record a follow: flag on, count incremented.
    pub fn record_vote(&mut self) {
        self.set_voted(true);
        self.set_vote_count(self.vote_count.saturating_add(1));
    }

    /// Record an unfollow: flag off, count decremented with a floor of zero.
    pub fn record_unvote(&mut self) {
        self.set_voted(false);
        self.set_vote_count(self.vote_count.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_use_defaults() {
        let topic: Topic = serde_json::from_str(r#"{"id": 9}"#).unwrap();
        assert_eq!(topic.id, 9);
        assert_eq!(topic.title, "");
        assert!(topic.category.is_none());
        assert!(topic.visible);
        assert_eq!(topic.vote_count, 0);
    }

    #[test]
    fn test_null_fields_use_defaults() {
        let json = r#"{
            "id": 3, "title": null, "posters": null, "tags": null,
            "vote_count": null, "visible": null, "category": null,
            "thumbnails": null, "user_voted": null
        }"#;
        let topic: Topic = serde_json::from_str(json).unwrap();
        assert_eq!(topic.title, "");
        assert!(topic.posters.is_empty());
        assert!(topic.tags.is_empty());
        assert!(topic.visible);
        assert!(!topic.user_voted);
    }

    #[test]
    fn test_opening_poster_prefers_flagged_entry() {
        let topic = Topic {
            posters: vec![
                Poster {
                    description: "Frequent Poster".into(),
                    user: Some(PosterUser {
                        username: "bob".into(),
                        ..Default::default()
                    }),
                },
                Poster {
                    description: "Original Poster, Most Recent Poster".into(),
                    user: Some(PosterUser {
                        username: "alice".into(),
                        ..Default::default()
                    }),
                },
            ],
            ..Default::default()
        };
        assert_eq!(topic.opening_user().unwrap().username, "alice");
    }

    #[test]
    fn test_opening_poster_falls_back_to_first() {
        let topic = Topic {
            posters: vec![Poster {
                description: "Most Recent Poster".into(),
                user: None,
            }],
            ..Default::default()
        };
        assert!(topic.opening_poster().is_some());
        assert!(topic.opening_user().is_none());
        assert!(Topic::default().opening_poster().is_none());
    }

    #[test]
    fn test_unvote_floors_at_zero() {
        let mut topic = Topic {
            user_voted: true,
            vote_count: 0,
            ..Default::default()
        };
        topic.record_unvote();
        assert!(!topic.user_voted);
        assert_eq!(topic.vote_count, 0);
    }

    #[test]
    fn test_apply_status_routes_to_flag() {
        let mut topic = Topic::default();
        topic.apply_status(TopicStatus::Visible, false);
        topic.apply_status(TopicStatus::Closed, true);
        assert!(!topic.status(TopicStatus::Visible));
        assert!(topic.status(TopicStatus::Closed));
        assert!(!topic.archived);
    }
}
