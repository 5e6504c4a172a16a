//! Badge tiers and progress towards the next tier.
//!
//! Badges are a fixed ladder of cumulative submission counts. Everything here is
//! a pure function of the count, so a badge is never revoked while the count
//! does not go down.

use serde::Serialize;

/// A static badge tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub id: &'static str,
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    /// Cumulative submission count needed to earn this badge.
    pub threshold: u32,
    pub color: &'static str,
}

/// All badge tiers, ordered by strictly increasing threshold.
pub const BADGES: [Badge; 6] = [
    Badge {
        id: "first-step",
        name: "First Step",
        icon: "🥋",
        description: "Submitted your first kata video",
        threshold: 1,
        color: "emerald",
    },
    Badge {
        id: "committed",
        name: "Committed",
        icon: "🔥",
        description: "Five kata videos submitted",
        threshold: 5,
        color: "orange",
    },
    Badge {
        id: "dedicated",
        name: "Dedicated",
        icon: "⭐",
        description: "Ten kata videos submitted",
        threshold: 10,
        color: "yellow",
    },
    Badge {
        id: "devoted",
        name: "Devoted",
        icon: "🏅",
        description: "Twenty kata videos submitted",
        threshold: 20,
        color: "blue",
    },
    Badge {
        id: "master",
        name: "Master",
        icon: "🏆",
        description: "Fifty kata videos submitted",
        threshold: 50,
        color: "purple",
    },
    Badge {
        id: "legend",
        name: "Legend",
        icon: "👑",
        description: "One hundred kata videos submitted",
        threshold: 100,
        color: "red",
    },
];

/// Progress from the highest earned badge towards the next one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: u32,
    pub target: u32,
    pub percentage: u8,
}

/// Everything a caller needs to render badges for one count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BadgeReport {
    pub count: u32,
    pub earned: Vec<Badge>,
    pub next: Option<Badge>,
    pub progress: Option<Progress>,
}

/// Every badge whose threshold is at most `count`, in ascending order.
pub fn badges_earned(count: u32) -> Vec<&'static Badge> {
    BADGES.iter().filter(|b| count >= b.threshold).collect()
}

/// The lowest badge not yet earned, or `None` once the top tier is reached.
pub fn next_badge(count: u32) -> Option<&'static Badge> {
    BADGES.iter().find(|b| b.threshold > count)
}

/// Progress towards [`next_badge`], measured from the highest earned threshold.
pub fn progress_to_next(count: u32) -> Option<Progress> {
    let target = next_badge(count)?.threshold;
    let start = badges_earned(count)
        .last()
        .map(|b| b.threshold)
        .unwrap_or(0);

    // target > start always holds because thresholds strictly increase.
    let span = f64::from(target - start);
    let done = f64::from(count.saturating_sub(start));
    let percentage = (100.0 * done / span).round().clamp(0.0, 100.0) as u8;

    Some(Progress {
        current: count,
        target,
        percentage,
    })
}

pub fn badge_report(count: u32) -> BadgeReport {
    BadgeReport {
        count,
        earned: badges_earned(count).into_iter().copied().collect(),
        next: next_badge(count).copied(),
        progress: progress_to_next(count),
    }
}
