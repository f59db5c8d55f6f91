use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub type Id = i64;

/// Media kind of an ad, derived from the uploaded MIME type at create time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "ad_type", rename_all = "lowercase")]
pub enum AdType {
    Photo,
    Video,
}

impl AdType {
    /// `video/*` maps to `Video`; everything else is treated as a photo.
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("video/") {
            AdType::Video
        } else {
            AdType::Photo
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Ad {
    pub id: Id,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: AdType,
    pub url: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub views: i32,
    pub likes: i32,
}

/// One row of the list response: the ad plus the caller's own engagement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct AdListItem {
    pub id: Id,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: AdType,
    pub url: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub views: i32,
    pub likes: i32,
    pub user_liked: bool,
    pub user_viewed: bool,
}

/// Insert payload for the repository; url already points at the CDN.
#[derive(Debug, Clone)]
pub struct NewAd {
    pub kind: AdType,
    pub url: String,
    pub title: String,
    pub description: String,
}

/// JSON body of POST. Fields default to empty so absence and `""` take the
/// same validation path instead of a framework deserialization error.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdRequest {
    #[serde(default)]
    pub file_data: String, // base64
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_type: String, // MIME type as sent by the client
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl CreateAdRequest {
    pub fn has_required_fields(&self) -> bool {
        !(self.file_data.is_empty()
            || self.file_name.is_empty()
            || self.file_type.is_empty()
            || self.title.is_empty()
            || self.description.is_empty())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteResponse {
    pub success: bool,
}
