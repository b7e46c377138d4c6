use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire format of every timestamp in the article payload.
pub const ARTICLE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub author: Author,
    pub category: String,
    pub image_url: String,
    pub likes_count: u64,
    pub is_saved: bool,
    pub is_liked: bool,
    pub meta_data: MetaData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    #[serde(rename = "authorName")]
    pub name: String,
    #[serde(rename = "authorAvatar")]
    pub avatar: Avatar,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Avatar {
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaData {
    #[serde(with = "article_date")]
    pub creation_time: DateTime<Utc>,
    #[serde(with = "article_date")]
    pub update_time: DateTime<Utc>,
}

/// Envelope returned by the articles endpoint: `{"data": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleList {
    #[serde(default)]
    pub data: Vec<Article>,
}

impl Article {
    pub fn author_image_url(&self) -> &str {
        &self.author.avatar.image_url
    }
}

// Equality also looks at the mutable engagement fields so list diffing notices
// likes/saved/liked changes. Hash stays on `id` alone; equal records still
// hash equally because `id` is part of the comparison.
impl PartialEq for Article {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.likes_count == other.likes_count
            && self.is_saved == other.is_saved
            && self.is_liked == other.is_liked
    }
}

impl Eq for Article {}

impl Hash for Article {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

pub mod article_date {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::ARTICLE_DATE_FORMAT;

    pub fn parse(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        NaiveDateTime::parse_from_str(value, ARTICLE_DATE_FORMAT).map(|naive| naive.and_utc())
    }

    pub fn format(value: &DateTime<Utc>) -> String {
        value.format(ARTICLE_DATE_FORMAT).to_string()
    }

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::collections::HashSet;

    use chrono::{Datelike, Timelike};

    use super::*;

    const SAMPLE: &str = r#"{
        "id": "a1",
        "title": "Hidden Cafés of Lisbon",
        "author": {
            "id": "u9",
            "authorName": "Rita Marques",
            "authorAvatar": { "imageUrl": "https://img.example/u9.png" }
        },
        "category": "food",
        "imageUrl": "https://img.example/a1.jpg",
        "likesCount": 42,
        "isSaved": true,
        "isLiked": false,
        "metaData": {
            "creationTime": "2020-10-28T09:15:30.250Z",
            "updateTime": "2020-10-29T00:00:00.000Z"
        }
    }"#;

    fn hash_of(article: &Article) -> u64 {
        let mut hasher = DefaultHasher::new();
        article.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn decodes_wire_field_names() {
        let article: Article = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(article.author.name, "Rita Marques");
        assert_eq!(article.author_image_url(), "https://img.example/u9.png");
        assert_eq!(article.likes_count, 42);
        let created = article.meta_data.creation_time;
        assert_eq!((created.year(), created.month(), created.day()), (2020, 10, 28));
        assert_eq!(created.timestamp_subsec_millis(), 250);
        assert_eq!(created.hour(), 9);
    }

    #[test]
    fn dates_serialise_in_wire_format() {
        let article: Article = serde_json::from_str(SAMPLE).unwrap();
        let json = serde_json::to_value(&article).unwrap();
        assert_eq!(json["metaData"]["creationTime"], "2020-10-28T09:15:30.250Z");
        assert_eq!(json["author"]["authorName"], "Rita Marques");
    }

    #[test]
    fn rejects_dates_outside_wire_format() {
        assert!(article_date::parse("2020-10-28 09:15:30").is_err());
        assert!(article_date::parse("2020-10-28T09:15:30.250Z").is_ok());
    }

    #[test]
    fn equality_tracks_engagement_but_hash_only_identity() {
        let original: Article = serde_json::from_str(SAMPLE).unwrap();
        let mut liked = original.clone();
        liked.is_liked = true;
        liked.likes_count += 1;

        assert_ne!(original, liked);
        assert_eq!(hash_of(&original), hash_of(&liked));

        let mut retitled = original.clone();
        retitled.title = "Something else".into();
        assert_eq!(original, retitled);

        let mut set = HashSet::new();
        set.insert(original.clone());
        assert!(set.contains(&retitled));
        assert!(!set.contains(&liked));
    }

    #[test]
    fn list_envelope_defaults_to_empty() {
        let list: ArticleList = serde_json::from_str("{}").unwrap();
        assert!(list.data.is_empty());
    }
}
