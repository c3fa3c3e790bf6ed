//! Response DTOs for Web API.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::content::{CommittedBatch, Content};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Result of `POST /upload`.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Id of the shareable record (the file, or the group).
    pub id: String,
    /// Shareable link.
    pub link: String,
    /// Whether the link points at a group of files.
    pub group: bool,
    /// Whether a password protects the upload.
    pub protected: bool,
}

impl UploadResponse {
    /// Describe a committed batch.
    pub fn new(batch: &CommittedBatch, link: String) -> Self {
        Self {
            id: batch.target.id.clone(),
            link,
            group: batch.target.is_group(),
            protected: batch.is_protected(),
        }
    }
}

/// One file in a group listing.
#[derive(Debug, Serialize)]
pub struct GroupFileResponse {
    /// File id.
    pub id: String,
    /// Display name without extension.
    pub name: String,
    /// Extension with leading dot, or empty.
    pub extension: String,
    /// MIME type.
    pub mime_type: String,
    /// Download link.
    pub link: String,
}

impl GroupFileResponse {
    /// Build from a file record. Groups nested in groups are not listed.
    pub fn from_content(content: &Content, link: String) -> Option<Self> {
        let info = content.file_info()?;
        Some(Self {
            id: content.id.clone(),
            name: info.name.clone(),
            extension: info.extension.clone(),
            mime_type: info.mime_type.clone(),
            link,
        })
    }
}

/// Group listing returned by `GET /{id}`.
#[derive(Debug, Serialize)]
pub struct GroupResponse {
    /// Group id.
    pub id: String,
    /// Upload time.
    pub date: DateTime<Utc>,
    /// Member files in upload order.
    pub files: Vec<GroupFileResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::FileInfo;

    #[test]
    fn test_group_file_from_content() {
        let file = Content::file(
            "aaaaaaaaaaaa",
            Utc::now(),
            FileInfo {
                name: "photo".to_string(),
                extension: ".png".to_string(),
                mime_type: "image/png".to_string(),
            },
        );
        let entry = GroupFileResponse::from_content(&file, "http://x/aaaaaaaaaaaa".to_string())
            .unwrap();
        assert_eq!(entry.name, "photo");
        assert_eq!(entry.extension, ".png");

        let group = Content::group("gggggggggggg", Utc::now(), vec![]);
        assert!(GroupFileResponse::from_content(&group, String::new()).is_none());
    }

    #[test]
    fn test_api_response_shape() {
        let response = ApiResponse::new(UploadResponse {
            id: "aaaaaaaaaaaa".to_string(),
            link: "http://localhost:8080/aaaaaaaaaaaa".to_string(),
            group: false,
            protected: true,
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["data"]["id"], "aaaaaaaaaaaa");
        assert_eq!(json["data"]["protected"], true);
    }
}
