//! HTTP surface.
//!
//! Public routes serve the submission form and read-only challenge content.
//! Admin routes require a moderator session token.

pub mod admin;
pub mod public;

use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::curated::CuratedKind;
use crate::error::ModerationError;
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(public::routes())
        .merge(admin::routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// Curated kind from a path segment; unknown kinds are a 404.
pub(crate) fn parse_kind(raw: &str) -> Result<CuratedKind, ModerationError> {
    CuratedKind::parse(raw).ok_or_else(|| ModerationError::not_found("content kind", raw))
}

/// Run `$body` with `$item` bound to the item type for `$kind`.
macro_rules! with_curated_kind {
    ($kind:expr, $item:ident => $body:expr) => {
        match $kind {
            $crate::curated::CuratedKind::Founders => {
                type $item = $crate::curated::Founder;
                $body
            }
            $crate::curated::CuratedKind::Testimonials => {
                type $item = $crate::curated::Testimonial;
                $body
            }
            $crate::curated::CuratedKind::FeaturedDojos => {
                type $item = $crate::curated::FeaturedDojo;
                $body
            }
            $crate::curated::CuratedKind::Journey => {
                type $item = $crate::curated::JourneyContent;
                $body
            }
        }
    };
}

pub(crate) use with_curated_kind;
