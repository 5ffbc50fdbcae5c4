//! Pure projection of a [`Topic`] into the card the grid renders.
//!
//! Projection never fails: every missing field has a fallback, and the output
//! holds no references back into the topic, so it is recomputed on each pass
//! instead of cached across mutations.
use crate::config::Settings;
use crate::topic::{Topic, TopicId};
use crate::util::absolutize;
use serde::Serialize;
use url::Url;

/// Size substituted into avatar templates.
pub const AVATAR_SIZE: &str = "200";
/// Placeholder in avatar templates.
const AVATAR_SIZE_TOKEN: &str = "{size}";
/// Shown when the opening poster is unknown.
const UNKNOWN_USERNAME: &str = "Unknown";

// ============================================================================
// Accent Palette
// ============================================================================

/// Decorative border treatment, assigned cyclically by grid position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Accent {
    BlueIndigo,
    PurplePink,
    OrangeRed,
    TealGreen,
}

impl Accent {
    pub const PALETTE: [Accent; 4] = [
        Accent::BlueIndigo,
        Accent::PurplePink,
        Accent::OrangeRed,
        Accent::TealGreen,
    ];

    /// Accent for the card at `index`.
    pub fn for_index(index: usize) -> Accent {
        Self::PALETTE[index % Self::PALETTE.len()]
    }

    pub fn gradient(&self) -> &'static str {
        match self {
            Accent::BlueIndigo => "linear-gradient(to right, #3b82f6, #6366f1)",
            Accent::PurplePink => "linear-gradient(to right, #a855f7, #ec4899)",
            Accent::OrangeRed => "linear-gradient(to right, #f97316, #ef4444)",
            Accent::TealGreen => "linear-gradient(to right, #14b8a6, #22c55e)",
        }
    }
}

// ============================================================================
// Display Types
// ============================================================================

/// Tag with its browse URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagLink {
    pub name: String,
    pub url: String,
}

impl TagLink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            url: tag_url(name),
        }
    }
}

/// Browse URL for a tag.
pub fn tag_url(name: &str) -> String {
    format!("/tag/{}", name)
}

/// Navigation URL for a topic.
pub fn topic_url(topic: &Topic) -> String {
    if topic.slug.is_empty() {
        format!("/t/{}", topic.id)
    } else {
        format!("/t/{}/{}", topic.slug, topic.id)
    }
}

/// Display-ready card derived from one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayItem {
    pub id: TopicId,
    pub title: String,
    pub description: String,
    pub category_name: String,
    pub username: String,
    pub author_name: String,
    /// Absolute URL, or empty when there is nothing to show.
    pub thumbnail_url: String,
    pub tags: Vec<TagLink>,
    pub vote_count: u32,
    pub user_voted: bool,
    pub vote_label: String,
    pub url: String,
    pub accent: Accent,
    /// CSS background for the accent border.
    pub gradient: &'static str,
    pub selected: bool,
    pub show_checkbox: bool,
}

/// Inputs shared by every projection in a pass.
#[derive(Debug, Clone)]
pub struct ProjectionContext<'a> {
    pub origin: &'a Url,
    pub settings: &'a Settings,
    pub bulk_mode: bool,
}

// ============================================================================
// Projection
// ============================================================================

/// Resolve the card thumbnail: explicit image, first thumbnail, opening
/// poster's avatar, else empty.
pub fn resolve_thumbnail(topic: &Topic, origin: &Url) -> String {
    let raw = topic
        .image_url
        .as_deref()
        .filter(|u| !u.is_empty())
        .map(str::to_owned)
        .or_else(|| {
            topic
                .thumbnails
                .first()
                .map(|t| t.url.clone())
                .filter(|u| !u.is_empty())
        })
        .or_else(|| {
            topic
                .opening_user()
                .and_then(|u| u.avatar_template.as_deref())
                .filter(|t| !t.is_empty())
                .map(|t| t.replace(AVATAR_SIZE_TOKEN, AVATAR_SIZE))
        });

    match raw {
        Some(url) => absolutize(&url, origin),
        None => String::new(),
    }
}

/// Project `topic` at grid position `index`.
///
/// `selected` is whether the selection store holds this topic.
pub fn project(
    topic: &Topic,
    index: usize,
    selected: bool,
    ctx: &ProjectionContext<'_>,
) -> DisplayItem {
    let user = topic.opening_user();

    let category_name = topic
        .category
        .as_ref()
        .map(|c| c.name.as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(&ctx.settings.default_category_label)
        .to_owned();

    let username = user
        .map(|u| u.username.as_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(UNKNOWN_USERNAME)
        .to_owned();

    let author_name = user
        .and_then(|u| u.name.as_deref())
        .filter(|n| !n.is_empty())
        .unwrap_or(&topic.last_poster_username)
        .to_owned();

    DisplayItem {
        id: topic.id,
        title: topic.title.clone(),
        description: topic.excerpt.clone(),
        category_name,
        username,
        author_name,
        thumbnail_url: resolve_thumbnail(topic, ctx.origin),
        tags: topic.tags.iter().map(|t| TagLink::new(t)).collect(),
        vote_count: topic.vote_count,
        user_voted: topic.user_voted,
        vote_label: ctx.settings.vote_button_label(topic.user_voted).to_owned(),
        url: topic_url(topic),
        accent: Accent::for_index(index),
        gradient: Accent::for_index(index).gradient(),
        selected: ctx.bulk_mode && selected,
        show_checkbox: ctx.bulk_mode,
    }
}

/// Project a whole collection in order.
pub fn project_all<F>(
    topics: &[Topic],
    ctx: &ProjectionContext<'_>,
    is_selected: F,
) -> Vec<DisplayItem>
where
    F: Fn(TopicId) -> bool,
{
    topics
        .iter()
        .enumerate()
        .map(|(i, t)| project(t, i, is_selected(t.id), ctx))
        .collect()
}
