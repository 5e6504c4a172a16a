//! Editorially curated content: founders, testimonials, featured dojos and
//! journey (educational) articles.
//!
//! All four kinds share storage and lifecycle; only their payload differs.
//! Records are stored with their item JSON-encoded and decoded back into the
//! typed item at this boundary.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Session;
use crate::error::{ModerationError, ValidationError};
use crate::state_machine::repository::{CuratedRow, Repository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CuratedKind {
    Founders,
    Testimonials,
    FeaturedDojos,
    Journey,
}

impl CuratedKind {
    pub const ALL: [CuratedKind; 4] = [
        Self::Founders,
        Self::Testimonials,
        Self::FeaturedDojos,
        Self::Journey,
    ];

    /// Name used in URLs and the storage `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Founders => "founders",
            Self::Testimonials => "testimonials",
            Self::FeaturedDojos => "featured-dojos",
            Self::Journey => "journey",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for CuratedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload type of one curated kind.
pub trait CuratedItem: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: CuratedKind;

    fn validate(&self) -> Result<(), ValidationError>;
}

fn require(errors: &mut ValidationError, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(field, "is required");
    }
}

fn optional_url(errors: &mut ValidationError, field: &'static str, value: Option<&str>) {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return;
    };
    match url::Url::parse(value) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
        _ => errors.push(field, "must be an http(s) URL"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Founder {
    pub name: String,
    pub role: String,
    pub bio: String,
    /// Matched to dojos by name only.
    #[serde(default)]
    pub dojo_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl CuratedItem for Founder {
    const KIND: CuratedKind = CuratedKind::Founders;

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        require(&mut errors, "name", &self.name);
        require(&mut errors, "role", &self.role);
        optional_url(&mut errors, "photo_url", self.photo_url.as_deref());
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Testimonial {
    pub author: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub dojo_name: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub quote: String,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl CuratedItem for Testimonial {
    const KIND: CuratedKind = CuratedKind::Testimonials;

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        require(&mut errors, "author", &self.author);
        require(&mut errors, "quote", &self.quote);
        optional_url(&mut errors, "photo_url", self.photo_url.as_deref());
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturedDojo {
    pub dojo_name: String,
    pub city: String,
    pub country: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl CuratedItem for FeaturedDojo {
    const KIND: CuratedKind = CuratedKind::FeaturedDojos;

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        require(&mut errors, "dojo_name", &self.dojo_name);
        require(&mut errors, "city", &self.city);
        require(&mut errors, "country", &self.country);
        optional_url(&mut errors, "image_url", self.image_url.as_deref());
        optional_url(&mut errors, "website", self.website.as_deref());
        errors.into_result()
    }
}

/// Educational article shown on the journey page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyContent {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
}

impl CuratedItem for JourneyContent {
    const KIND: CuratedKind = CuratedKind::Journey;

    fn validate(&self) -> Result<(), ValidationError> {
        let mut errors = ValidationError::new();
        require(&mut errors, "title", &self.title);
        require(&mut errors, "body", &self.body);
        optional_url(&mut errors, "media_url", self.media_url.as_deref());
        errors.into_result()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CuratedRecord<T> {
    pub id: Uuid,
    pub order_index: i64,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub item: T,
}

impl<T: CuratedItem> CuratedRecord<T> {
    fn from_row(row: CuratedRow) -> Result<Self, serde_json::Error> {
        Ok(Self {
            id: row.id,
            order_index: row.order_index,
            published: row.published,
            created_at: row.created_at,
            item: serde_json::from_value(row.payload)?,
        })
    }

    fn to_row(&self) -> Result<CuratedRow, ModerationError> {
        let payload = serde_json::to_value(&self.item).map_err(|e| ModerationError::Storage {
            message: format!("failed to encode {} record: {}", T::KIND, e),
        })?;
        Ok(CuratedRow {
            kind: T::KIND,
            id: self.id,
            order_index: self.order_index,
            published: self.published,
            created_at: self.created_at,
            payload,
        })
    }
}

/// Body of a create or update request.
#[derive(Debug, Clone, Deserialize)]
pub struct CuratedInput<T> {
    #[serde(flatten)]
    pub item: T,
    #[serde(default)]
    pub order_index: Option<i64>,
    #[serde(default)]
    pub published: Option<bool>,
}

pub struct CuratedService<T> {
    repo: Arc<dyn Repository>,
    _item: PhantomData<fn() -> T>,
}

impl<T: CuratedItem> CuratedService<T> {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self {
            repo,
            _item: PhantomData,
        }
    }

    /// Records in display order. Rows that no longer decode are skipped.
    pub async fn list(
        &self,
        published_only: bool,
    ) -> Result<Vec<CuratedRecord<T>>, ModerationError> {
        let rows = self.repo.list_curated(T::KIND).await?;
        Ok(rows
            .into_iter()
            .filter(|row| !published_only || row.published)
            .filter_map(|row| {
                let id = row.id;
                match CuratedRecord::from_row(row) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Skipping unreadable {} record {}: {}", T::KIND, id, e);
                        None
                    }
                }
            })
            .collect())
    }

    async fn get(&self, id: Uuid) -> Result<CuratedRecord<T>, ModerationError> {
        let row = self
            .repo
            .get_curated(T::KIND, id)
            .await?
            .ok_or_else(|| ModerationError::not_found(T::KIND.as_str(), id))?;
        CuratedRecord::from_row(row).map_err(|e| ModerationError::Storage {
            message: format!("corrupt {} record {}: {}", T::KIND, id, e),
        })
    }

    /// Create a record. Without an explicit position it goes last.
    pub async fn create(
        &self,
        session: &Session,
        input: CuratedInput<T>,
    ) -> Result<CuratedRecord<T>, ModerationError> {
        let moderator = session.require_moderator()?;
        input.item.validate()?;

        let order_index = match input.order_index {
            Some(index) => index,
            None => self
                .repo
                .list_curated(T::KIND)
                .await?
                .iter()
                .map(|row| row.order_index + 1)
                .max()
                .unwrap_or(0),
        };
        let record = CuratedRecord {
            id: Uuid::new_v4(),
            order_index,
            published: input.published.unwrap_or(true),
            created_at: Utc::now(),
            item: input.item,
        };
        self.repo.put_curated(&record.to_row()?).await?;
        info!(
            "{} created {} record {}",
            moderator.email,
            T::KIND,
            record.id
        );
        Ok(record)
    }

    pub async fn update(
        &self,
        session: &Session,
        id: Uuid,
        input: CuratedInput<T>,
    ) -> Result<CuratedRecord<T>, ModerationError> {
        let moderator = session.require_moderator()?;
        input.item.validate()?;

        let mut record = self.get(id).await?;
        record.item = input.item;
        if let Some(index) = input.order_index {
            record.order_index = index;
        }
        if let Some(published) = input.published {
            record.published = published;
        }
        self.repo.put_curated(&record.to_row()?).await?;
        info!("{} updated {} record {}", moderator.email, T::KIND, id);
        Ok(record)
    }

    pub async fn delete(&self, session: &Session, id: Uuid) -> Result<(), ModerationError> {
        let moderator = session.require_moderator()?;
        if self.repo.get_curated(T::KIND, id).await?.is_none() {
            return Err(ModerationError::not_found(T::KIND.as_str(), id));
        }
        let affected = self.repo.delete_curated(T::KIND, id).await?;
        if affected == 0 {
            warn!("Delete of {} record {} affected no rows", T::KIND, id);
            return Err(ModerationError::DeleteNotApplied {
                what: T::KIND.as_str(),
                id: id.to_string(),
            });
        }
        info!("{} deleted {} record {}", moderator.email, T::KIND, id);
        Ok(())
    }

    /// Give each id the order index of its position in `ids`. An id listed
    /// twice is a validation error.
    pub async fn reorder(
        &self,
        session: &Session,
        ids: &[Uuid],
    ) -> Result<Vec<CuratedRecord<T>>, ModerationError> {
        session.require_moderator()?;
        let mut seen = HashSet::new();
        if let Some(repeated) = ids.iter().find(|id| !seen.insert(**id)) {
            let message = format!("{} is listed more than once", repeated);
            return Err(ValidationError::single("ids", message).into());
        }
        let existing = self.repo.list_curated(T::KIND).await?;
        if let Some(missing) = ids
            .iter()
            .find(|id| !existing.iter().any(|row| row.id == **id))
        {
            return Err(ModerationError::not_found(T::KIND.as_str(), missing));
        }
        let updated = self.repo.set_curated_order(T::KIND, ids).await?;
        if updated != ids.len() {
            return Err(ModerationError::BulkIncomplete {
                requested: ids.len(),
                updated,
            });
        }
        self.list(false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Moderator;
    use crate::state_machine::repository::InMemoryRepository;

    fn moderator() -> Session {
        Session::Moderator(Moderator {
            email: "admin@example.com".to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(1),
        })
    }

    fn testimonial(author: &str) -> CuratedInput<Testimonial> {
        CuratedInput {
            item: Testimonial {
                author: author.to_string(),
                role: None,
                dojo_name: Some("Kodokan".to_string()),
                country: Some("Japan".to_string()),
                quote: "Maximum efficiency, mutual welfare.".to_string(),
                photo_url: None,
            },
            order_index: None,
            published: None,
        }
    }

    fn service() -> CuratedService<Testimonial> {
        CuratedService::new(Arc::new(InMemoryRepository::new()))
    }

    #[test]
    fn kind_names_round_trip() {
        for kind in CuratedKind::ALL {
            assert_eq!(CuratedKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(CuratedKind::parse("education"), None);
    }

    #[test]
    fn validation_collects_missing_fields() {
        let item = FeaturedDojo {
            dojo_name: " ".to_string(),
            city: "Paris".to_string(),
            country: String::new(),
            description: None,
            image_url: Some("not a url".to_string()),
            website: None,
        };
        let err = item.validate().unwrap_err();
        assert!(err.has("dojo_name"));
        assert!(err.has("country"));
        assert!(err.has("image_url"));
        assert!(!err.has("city"));
    }

    #[test]
    fn record_serializes_item_inline() {
        let record = CuratedRecord {
            id: Uuid::nil(),
            order_index: 2,
            published: true,
            created_at: DateTime::from_timestamp(0, 0).unwrap(),
            item: JourneyContent {
                title: "Nage-no-kata".to_string(),
                body: "Forms of throwing.".to_string(),
                category: None,
                media_url: None,
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["title"], "Nage-no-kata");
        assert_eq!(json["order_index"], 2);
    }

    #[tokio::test]
    async fn create_appends_in_display_order() {
        let service = service();
        let session = moderator();

        let first = service.create(&session, testimonial("A")).await.unwrap();
        let second = service.create(&session, testimonial("B")).await.unwrap();

        assert_eq!(first.order_index, 0);
        assert_eq!(second.order_index, 1);
        let authors: Vec<_> = service
            .list(true)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.item.author)
            .collect();
        assert_eq!(authors, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn unpublished_records_are_hidden_from_public_list() {
        let service = service();
        let session = moderator();
        let mut input = testimonial("Hidden");
        input.published = Some(false);
        service.create(&session, input).await.unwrap();

        assert!(service.list(true).await.unwrap().is_empty());
        assert_eq!(service.list(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn anonymous_cannot_create() {
        let err = service()
            .create(&Session::Anonymous, testimonial("A"))
            .await
            .unwrap_err();
        assert_eq!(err, ModerationError::Unauthenticated);
    }

    #[tokio::test]
    async fn update_keeps_unspecified_fields() {
        let service = service();
        let session = moderator();
        let created = service.create(&session, testimonial("A")).await.unwrap();

        let updated = service
            .update(&session, created.id, testimonial("A. Sensei"))
            .await
            .unwrap();

        assert_eq!(updated.item.author, "A. Sensei");
        assert_eq!(updated.order_index, created.order_index);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let err = service()
            .delete(&moderator(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn reorder_assigns_positions() {
        let service = service();
        let session = moderator();
        let a = service.create(&session, testimonial("A")).await.unwrap();
        let b = service.create(&session, testimonial("B")).await.unwrap();
        let c = service.create(&session, testimonial("C")).await.unwrap();

        let records = service.reorder(&session, &[c.id, a.id, b.id]).await.unwrap();

        let authors: Vec<_> = records.into_iter().map(|r| r.item.author).collect();
        assert_eq!(authors, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn reorder_rejects_foreign_ids() {
        let service = service();
        let session = moderator();
        service.create(&session, testimonial("A")).await.unwrap();

        let err = service
            .reorder(&session, &[Uuid::new_v4()])
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn reorder_rejects_repeated_ids() {
        let service = service();
        let session = moderator();
        let a = service.create(&session, testimonial("A")).await.unwrap();
        let b = service.create(&session, testimonial("B")).await.unwrap();

        let err = service
            .reorder(&session, &[b.id, a.id, b.id])
            .await
            .unwrap_err();
        assert!(matches!(err, ModerationError::Validation(_)));

        // Nothing was rewritten
        let authors: Vec<_> = service
            .list(false)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.item.author)
            .collect();
        assert_eq!(authors, vec!["A", "B"]);
    }
}
