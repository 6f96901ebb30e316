//! Stored row decoding
//!
//! Rows carry the canonical JSON form of the full post; decoding is a
//! pure serde_json deserialization with no side effects.

use super::models::{Post, StoredRow};
use crate::error::AppError;
use crate::service::loader::RecordDecoder;

/// Decoder for JSON payloads written by the refresh pipeline
#[derive(Debug, Clone, Default)]
pub struct JsonRecordDecoder;

impl RecordDecoder for JsonRecordDecoder {
    fn decode(&self, row: &StoredRow) -> Result<Post, AppError> {
        let post: Post = serde_json::from_str(&row.payload)?;
        Ok(post)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::models::PostAuthor;
    use chrono::Utc;

    fn sample_post() -> Post {
        Post {
            id: "100".to_string(),
            created_at: Utc::now(),
            author: PostAuthor {
                id: "7".to_string(),
                handle: "alice@example.com".to_string(),
                display_name: Some("Alice".to_string()),
                avatar_url: None,
            },
            text: "hello".to_string(),
            media: Vec::new(),
        }
    }

    #[test]
    fn test_decode_round_trips_payload() {
        let post = sample_post();
        let row = post.to_stored_row().unwrap();

        let decoded = JsonRecordDecoder.decode(&row).unwrap();
        assert_eq!(decoded, post);
    }

    #[test]
    fn test_decode_rejects_malformed_payload() {
        let mut row = sample_post().to_stored_row().unwrap();
        row.payload = "{not json".to_string();

        let result = JsonRecordDecoder.decode(&row);
        assert!(matches!(result, Err(AppError::Decode(_))));
    }

    #[test]
    fn test_decode_defaults_missing_media() {
        let post = sample_post();
        let mut row = post.to_stored_row().unwrap();
        // Older payloads may predate the media field
        let mut value: serde_json::Value = serde_json::from_str(&row.payload).unwrap();
        value.as_object_mut().unwrap().remove("media");
        row.payload = value.to_string();

        let decoded = JsonRecordDecoder.decode(&row).unwrap();
        assert!(decoded.media.is_empty());
    }
}
