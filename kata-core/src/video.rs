//! Video references and YouTube id extraction.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Length of a YouTube video id.
pub const VIDEO_ID_LEN: usize = 11;

fn video_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?:watch\?v=|youtu\.be/|embed/)([A-Za-z0-9_-]{11})")
            .expect("video id pattern is valid")
    })
}

/// Extract the video id from a `watch?v=`, `youtu.be/` or `embed/` URL.
///
/// Returns `None` for anything else; callers fall back to linking out.
pub fn extract_video_id(url: &str) -> Option<String> {
    video_id_pattern()
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn embed_url(video_id: &str) -> String {
    format!("https://www.youtube.com/embed/{}", video_id)
}

/// Where a submission's video lives.
///
/// Rows carry either an external platform URL or a path into hosted storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VideoRef {
    External { url: String },
    Hosted { path: String },
    Missing,
}

impl VideoRef {
    /// Build from the two nullable storage columns. A URL wins over a path.
    pub fn from_columns(url: Option<String>, path: Option<String>) -> Self {
        let url = url.filter(|s| !s.trim().is_empty());
        let path = path.filter(|s| !s.trim().is_empty());
        match (url, path) {
            (Some(url), _) => Self::External { url },
            (None, Some(path)) => Self::Hosted { path },
            (None, None) => Self::Missing,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            Self::External { url } => Some(url),
            _ => None,
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Hosted { path } => Some(path),
            _ => None,
        }
    }

    /// How the video should be shown on a public page.
    pub fn display(&self) -> VideoDisplay {
        match self {
            Self::External { url } => match extract_video_id(url) {
                Some(video_id) => VideoDisplay::Embedded {
                    embed_url: embed_url(&video_id),
                    video_id,
                },
                None => VideoDisplay::LinkOut { url: url.clone() },
            },
            Self::Hosted { path } => VideoDisplay::Hosted { path: path.clone() },
            Self::Missing => VideoDisplay::Unavailable,
        }
    }
}

/// Rendering decision for a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum VideoDisplay {
    Embedded { video_id: String, embed_url: String },
    LinkOut { url: String },
    Hosted { path: String },
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn extracts_from_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=ABCDEFGHIJK"),
            Some("ABCDEFGHIJK".to_string())
        );
    }

    #[test]
    fn extracts_from_short_url() {
        assert_eq!(
            extract_video_id("https://youtu.be/ABCDEFGHIJK"),
            Some("ABCDEFGHIJK".to_string())
        );
    }

    #[test]
    fn extracts_from_embed_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/a1_b2-c3d4E?start=10"),
            Some("a1_b2-c3d4E".to_string())
        );
    }

    #[test]
    fn ignores_trailing_query() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=ABCDEFGHIJK&t=42s"),
            Some("ABCDEFGHIJK".to_string())
        );
    }

    #[test]
    fn unknown_url_has_no_id() {
        assert_eq!(extract_video_id("https://example.com/video"), None);
        assert_eq!(extract_video_id("https://youtu.be/short"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn url_wins_over_path() {
        let video = VideoRef::from_columns(
            Some("https://youtu.be/ABCDEFGHIJK".to_string()),
            Some("videos/a.mp4".to_string()),
        );
        assert_eq!(video.url(), Some("https://youtu.be/ABCDEFGHIJK"));
    }

    #[test]
    fn blank_columns_are_missing() {
        let video = VideoRef::from_columns(Some("  ".to_string()), None);
        assert_eq!(video, VideoRef::Missing);
        assert_eq!(video.display(), VideoDisplay::Unavailable);
    }

    #[test]
    fn display_falls_back_to_link() {
        let video = VideoRef::External {
            url: "https://vimeo.com/12345".to_string(),
        };
        assert_eq!(
            video.display(),
            VideoDisplay::LinkOut {
                url: "https://vimeo.com/12345".to_string()
            }
        );
    }

    #[test]
    fn display_embeds_known_ids() {
        let video = VideoRef::External {
            url: "https://youtu.be/ABCDEFGHIJK".to_string(),
        };
        assert_eq!(
            video.display(),
            VideoDisplay::Embedded {
                video_id: "ABCDEFGHIJK".to_string(),
                embed_url: "https://www.youtube.com/embed/ABCDEFGHIJK".to_string(),
            }
        );
    }

    proptest! {
        #[test]
        fn any_valid_id_round_trips_through_watch_urls(id in "[A-Za-z0-9_-]{11}") {
            let url = format!("https://www.youtube.com/watch?v={}", id);
            prop_assert_eq!(extract_video_id(&url), Some(id));
        }

        #[test]
        fn urls_without_markers_have_no_id(path in "[a-z/]{0,30}") {
            let url = format!("https://example.org/{}", path);
            prop_assume!(!url.contains("embed/"));
            prop_assert_eq!(extract_video_id(&url), None);
        }
    }
}
