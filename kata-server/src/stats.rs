//! Public aggregates over submissions: challenge totals, the dojo hall of
//! fame and the approved-video gallery.
//!
//! These are pure functions over already-loaded records.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use kata_core::{badge_report, country, BadgeReport, VideoDisplay};
use serde::Serialize;

use crate::model::{Dojo, DojoId, Level, Page, Submission, SubmissionId, DEFAULT_LIMIT, MAX_LIMIT};
use crate::state_machine::SubmissionStatus;

/// Headline numbers for the challenge page.
///
/// `countries`, `dojos` and `by_level` only count approved submissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChallengeStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub countries: usize,
    pub dojos: usize,
    /// Approved submissions at levels 1 through 5.
    pub by_level: [usize; 5],
}

pub fn challenge_stats(submissions: &[Submission]) -> ChallengeStats {
    let mut stats = ChallengeStats {
        total: submissions.len(),
        ..Default::default()
    };
    let mut countries = HashSet::new();
    let mut dojos = HashSet::new();

    for s in submissions {
        match s.status() {
            SubmissionStatus::Pending => stats.pending += 1,
            SubmissionStatus::Rejected => stats.rejected += 1,
            SubmissionStatus::Approved => {
                stats.approved += 1;
                countries.insert(s.country.trim().to_lowercase());
                if let Some(id) = s.dojo_id {
                    dojos.insert(id);
                }
                let index = usize::from(s.level.get() - Level::MIN);
                stats.by_level[index] += 1;
            }
        }
    }

    stats.countries = countries.len();
    stats.dojos = dojos.len();
    stats
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HallOfFameEntry {
    pub dojo_id: DojoId,
    pub dojo_name: String,
    pub city: String,
    pub country: String,
    pub flag: String,
    pub approved_count: u32,
    pub badges: BadgeReport,
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// One entry per dojo with at least one approved submission, most approved
/// first, then by name.
pub fn hall_of_fame(submissions: &[Submission], dojos: &[Dojo]) -> Vec<HallOfFameEntry> {
    let mut counts: HashMap<DojoId, usize> = HashMap::new();
    for s in submissions.iter().filter(|s| s.moderation.is_approved()) {
        if let Some(id) = s.dojo_id {
            *counts.entry(id).or_default() += 1;
        }
    }

    let mut entries: Vec<HallOfFameEntry> = dojos
        .iter()
        .filter_map(|dojo| {
            let count = count_u32(*counts.get(&dojo.id)?);
            Some(HallOfFameEntry {
                dojo_id: dojo.id,
                dojo_name: dojo.name.clone(),
                city: dojo.city.clone(),
                country: dojo.country.clone(),
                flag: country::flag(&dojo.country),
                approved_count: count,
                badges: badge_report(count),
            })
        })
        .collect();

    entries.sort_by(|a, b| {
        b.approved_count
            .cmp(&a.approved_count)
            .then_with(|| a.dojo_name.cmp(&b.dojo_name))
    });
    entries
}

/// An approved submission as shown in the public gallery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GalleryItem {
    pub id: SubmissionId,
    pub country: String,
    pub flag: String,
    pub dojo_name: Option<String>,
    pub level: Level,
    pub participant_names: Option<String>,
    pub approved_at: DateTime<Utc>,
    pub video: VideoDisplay,
}

/// Render one submission for the gallery. Only approved submissions appear.
pub fn gallery_item(submission: &Submission, dojo: Option<&Dojo>) -> Option<GalleryItem> {
    let approved_at = submission.moderation.approved_at()?;
    Some(GalleryItem {
        id: submission.id,
        country: submission.country.clone(),
        flag: country::flag(&submission.country),
        dojo_name: dojo.map(|d| d.name.clone()),
        level: submission.level,
        participant_names: submission.participant_names.clone(),
        approved_at,
        video: submission.video.display(),
    })
}

/// A page of the gallery, most recently approved first.
pub fn gallery(
    submissions: &[Submission],
    dojos: &[Dojo],
    offset: Option<usize>,
    limit: Option<usize>,
) -> Page<GalleryItem> {
    let by_id: HashMap<DojoId, &Dojo> = dojos.iter().map(|d| (d.id, d)).collect();
    let mut items: Vec<GalleryItem> = submissions
        .iter()
        .filter_map(|s| gallery_item(s, s.dojo_id.and_then(|id| by_id.get(&id).copied())))
        .collect();
    items.sort_by(|a, b| b.approved_at.cmp(&a.approved_at).then_with(|| a.id.cmp(&b.id)));

    let offset = offset.unwrap_or(0);
    let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let total = items.len();
    Page {
        items: items.into_iter().skip(offset).take(limit).collect(),
        total,
        offset,
        limit,
        seq: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::ModerationState;
    use chrono::{Duration, TimeZone};
    use kata_core::VideoRef;
    use uuid::Uuid;

    fn dojo(name: &str, country: &str) -> Dojo {
        Dojo {
            id: DojoId::new(),
            name: name.to_string(),
            city: "City".to_string(),
            province: None,
            country: country.to_string(),
            instructor_name: "Sensei".to_string(),
            email: "dojo@example.com".to_string(),
            phone: None,
            website: None,
            student_count: None,
            created_at: Utc::now(),
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn submission(dojo: Option<&Dojo>, level: i64, state: ModerationState) -> Submission {
        Submission {
            id: SubmissionId(Uuid::new_v4()),
            dojo_id: dojo.map(|d| d.id),
            country: dojo.map(|d| d.country.clone()).unwrap_or_else(|| "Japan".to_string()),
            email: "judoka@example.com".to_string(),
            video: VideoRef::External {
                url: "https://youtu.be/dQw4w9WgXcQ".to_string(),
            },
            level: Level::new(level).unwrap(),
            participant_names: None,
            message: None,
            moderation: state,
            submitted_at: base(),
            admin_note: None,
        }
    }

    fn approved(minutes: i64) -> ModerationState {
        ModerationState::approved(base() + Duration::minutes(minutes))
    }

    #[test]
    fn stats_count_statuses_and_approved_breakdown() {
        let kodokan = dojo("Kodokan", "Japan");
        let budokwai = dojo("Budokwai", "United Kingdom");
        let submissions = vec![
            submission(Some(&kodokan), 1, approved(0)),
            submission(Some(&kodokan), 3, approved(1)),
            submission(Some(&budokwai), 3, approved(2)),
            submission(Some(&budokwai), 5, ModerationState::Pending),
            submission(None, 2, ModerationState::Rejected),
        ];

        let stats = challenge_stats(&submissions);

        assert_eq!(
            stats,
            ChallengeStats {
                total: 5,
                pending: 1,
                approved: 3,
                rejected: 1,
                countries: 2,
                dojos: 2,
                by_level: [1, 0, 2, 0, 0],
            }
        );
    }

    #[test]
    fn hall_of_fame_orders_by_count_then_name() {
        let a = dojo("Alpha", "France");
        let b = dojo("Bravo", "Japan");
        let c = dojo("Charlie", "Brazil");
        let idle = dojo("Idle", "Japan");
        let submissions = vec![
            submission(Some(&b), 1, approved(0)),
            submission(Some(&a), 1, approved(0)),
            submission(Some(&c), 1, approved(0)),
            submission(Some(&c), 1, approved(1)),
            submission(Some(&idle), 1, ModerationState::Pending),
        ];

        let entries = hall_of_fame(&submissions, &[a, b, c, idle]);

        let names: Vec<_> = entries.iter().map(|e| e.dojo_name.as_str()).collect();
        assert_eq!(names, vec!["Charlie", "Alpha", "Bravo"]);
        assert_eq!(entries[0].approved_count, 2);
        assert_eq!(entries[0].flag, "🇧🇷");
        assert_eq!(entries[0].badges.earned.len(), 1);
        assert_eq!(entries[0].badges.progress.map(|p| p.percentage), Some(25));
    }

    #[test]
    fn gallery_shows_only_approved_newest_first() {
        let d = dojo("Kodokan", "Japan");
        let mut hosted = submission(Some(&d), 2, approved(5));
        hosted.video = VideoRef::Hosted {
            path: "uploads/a.mp4".to_string(),
        };
        let submissions = vec![
            submission(Some(&d), 1, approved(0)),
            hosted,
            submission(None, 1, ModerationState::Pending),
        ];

        let page = gallery(&submissions, &[d], None, None);

        assert_eq!(page.total, 2);
        assert!(matches!(page.items[0].video, VideoDisplay::Hosted { .. }));
        assert!(matches!(
            &page.items[1].video,
            VideoDisplay::Embedded { video_id, .. } if video_id == "dQw4w9WgXcQ"
        ));
        assert_eq!(page.items[1].dojo_name.as_deref(), Some("Kodokan"));
    }

    #[test]
    fn unrecognized_url_links_out() {
        let mut s = submission(None, 1, approved(0));
        s.video = VideoRef::External {
            url: "https://vimeo.com/123".to_string(),
        };
        let item = gallery_item(&s, None).unwrap();
        assert_eq!(
            item.video,
            VideoDisplay::LinkOut {
                url: "https://vimeo.com/123".to_string()
            }
        );
        assert!(gallery_item(&submission(None, 1, ModerationState::Rejected), None).is_none());
    }
}
