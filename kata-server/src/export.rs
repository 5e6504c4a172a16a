//! CSV export of all submissions for moderators.

use std::collections::HashMap;

use kata_core::CsvWriter;

use crate::model::{Dojo, DojoId, Submission};
use crate::state_machine::SocialPost;

pub const CSV_HEADER: [&str; 18] = [
    "id",
    "submitted_at",
    "status",
    "country",
    "email",
    "dojo_name",
    "dojo_city",
    "level",
    "video_url",
    "video_path",
    "participant_names",
    "message",
    "approved_at",
    "admin_note",
    "facebook_url",
    "instagram_url",
    "youtube_url",
    "upload_error",
];

/// Render submissions (already newest first) as CSV.
pub fn submissions_csv(submissions: &[Submission], dojos: &[Dojo]) -> String {
    let dojos: HashMap<DojoId, &Dojo> = dojos.iter().map(|d| (d.id, d)).collect();
    let mut writer = CsvWriter::with_header(&CSV_HEADER);

    for s in submissions {
        let dojo = s.dojo_id.and_then(|id| dojos.get(&id).copied());
        let social = s.moderation.social();
        let published = social.and_then(SocialPost::published);
        let links = published.as_ref().map(|p| &p.links);
        let upload_error = match social {
            Some(SocialPost::Failed { error, .. }) => Some(error.as_str()),
            _ => None,
        };

        let row: [String; 18] = [
            s.id.to_string(),
            s.submitted_at.to_rfc3339(),
            s.status().to_string(),
            s.country.clone(),
            s.email.clone(),
            dojo.map(|d| d.name.clone()).unwrap_or_default(),
            dojo.map(|d| d.city.clone()).unwrap_or_default(),
            s.level.to_string(),
            s.video.url().unwrap_or_default().to_string(),
            s.video.path().unwrap_or_default().to_string(),
            s.participant_names.clone().unwrap_or_default(),
            s.message.clone().unwrap_or_default(),
            s.moderation
                .approved_at()
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
            s.admin_note.clone().unwrap_or_default(),
            links
                .and_then(|l| l.facebook_url.clone())
                .unwrap_or_default(),
            links
                .and_then(|l| l.instagram_url.clone())
                .unwrap_or_default(),
            links
                .and_then(|l| l.youtube_url.clone())
                .unwrap_or_default(),
            upload_error.unwrap_or_default().to_string(),
        ];
        writer.write_row(row.iter().map(String::as_str));
    }

    writer.finish()
}
