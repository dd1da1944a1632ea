use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Coarse record of how much of an event has been bulk-exported.
///
/// Variants are declared in ascending order so the derived `Ord` matches
/// `NotDownloaded < PartiallyDownloaded < FullyDownloaded`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    #[default]
    NotDownloaded,
    PartiallyDownloaded,
    FullyDownloaded,
}

/// What an archive build covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveScope {
    Event,
    Album(i64),
}

impl DownloadStatus {
    /// State after a successful archive build of the given scope. Never
    /// returns a state lower than `self`.
    pub fn after_build(self, scope: ArchiveScope) -> Self {
        match scope {
            ArchiveScope::Event => Self::FullyDownloaded,
            ArchiveScope::Album(_) if self == Self::FullyDownloaded => self,
            ArchiveScope::Album(_) => Self::PartiallyDownloaded,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotDownloaded => "not_downloaded",
            Self::PartiallyDownloaded => "partially_downloaded",
            Self::FullyDownloaded => "fully_downloaded",
        }
    }
}

impl FromStr for DownloadStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_downloaded" => Ok(Self::NotDownloaded),
            "partially_downloaded" => Ok(Self::PartiallyDownloaded),
            "fully_downloaded" => Ok(Self::FullyDownloaded),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
    pub download_status: DownloadStatus,
    pub last_downloaded_at: Option<String>,
    pub created_at: String,
}
