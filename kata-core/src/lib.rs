pub mod badge;
pub mod country;
pub mod csv;
pub mod video;

pub use badge::{
    badge_report, badges_earned, next_badge, progress_to_next, Badge, BadgeReport, Progress,
    BADGES,
};
pub use csv::CsvWriter;
pub use video::{extract_video_id, VideoDisplay, VideoRef};
