use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Prefix used for entry names inside download archives.
    pub fn archive_label(&self) -> &'static str {
        match self {
            Self::Image => "Photo",
            Self::Video => "Video",
        }
    }

    /// Sub-directory of the uploads root holding files of this kind.
    pub fn storage_dir(&self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Video => "videos",
        }
    }
}

impl FromStr for MediaKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "image" | "photo" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MediaItem {
    pub id: i64,
    pub event_id: i64,
    pub kind: MediaKind,
    /// Forward-slash path relative to the uploads root.
    pub stored_path: String,
    pub is_public: bool,
    pub contributor_name: Option<String>,
    pub duration_secs: Option<f64>,
    pub created_at: String,
}

impl MediaItem {
    pub fn url(&self) -> String {
        format!("/uploads/{}", self.stored_path)
    }
}

/// Insert payload for a media row whose file has already been written.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub event_id: i64,
    pub kind: MediaKind,
    pub stored_path: String,
    pub is_public: bool,
    pub contributor_name: Option<String>,
    pub duration_secs: Option<f64>,
    pub album_ids: Vec<i64>,
}
