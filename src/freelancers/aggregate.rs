//! Freelancer profile aggregate and its state transitions.
//!
//! Every mutator validates before it touches state, so a failed call leaves the
//! aggregate exactly as it was.

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const BIO_MAX_CHARS: usize = 500;
pub const RATING_MIN: u8 = 1;
pub const RATING_MAX: u8 = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Experience {
    #[default]
    Beginner,
    Intermediate,
    Expert,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Availability {
    #[default]
    Available,
    Busy,
    #[serde(rename = "Not Available")]
    NotAvailable,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Proficiency {
    Basic,
    Conversational,
    Fluent,
    Native,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Location {
    pub city: Option<String>,
    pub country: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PortfolioItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Language {
    pub language: String,
    pub proficiency: Option<Proficiency>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Education {
    pub degree: Option<String>,
    pub institution: Option<String>,
    pub year: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Certification {
    pub title: Option<String>,
    pub issuer: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub date: Option<OffsetDateTime>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub client_id: Uuid,
    pub project_id: Uuid,
    pub rating: u8,
    pub comment: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Rating {
    pub average: f64,
    pub count: u32,
}

/// Descriptive fields a freelancer edits directly. Counters, earnings and reviews
/// live on [`FreelancerProfile`] and change only through its event methods.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ProfileFields {
    pub skills: Vec<String>,
    pub experience: Experience,
    pub portfolio: Vec<PortfolioItem>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub hourly_rate: f64,
    pub location: Location,
    pub languages: Vec<Language>,
    pub education: Vec<Education>,
    pub certifications: Vec<Certification>,
    pub availability: Availability,
    pub response_time: Option<String>,
    pub success_rate: f64,
}

impl ProfileFields {
    /// Checks ranges and canonicalizes skills (trimmed, de-duplicated, order kept).
    pub fn validated(mut self) -> AppResult<Self> {
        if !self.hourly_rate.is_finite() || self.hourly_rate < 0.0 {
            return Err(AppError::Validation("hourly rate cannot be negative".into()));
        }
        if let Some(bio) = &self.bio {
            if bio.chars().count() > BIO_MAX_CHARS {
                return Err(AppError::Validation(format!(
                    "bio cannot be more than {} characters",
                    BIO_MAX_CHARS
                )));
            }
        }
        if !(0.0..=100.0).contains(&self.success_rate) {
            return Err(AppError::Validation("success rate must be within 0..=100".into()));
        }
        self.skills = normalize_skills(self.skills);
        Ok(self)
    }
}

fn normalize_skills(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for s in raw {
        let s = s.trim();
        if !s.is_empty() && !out.iter().any(|seen| seen == s) {
            out.push(s.to_string());
        }
    }
    out
}

/// Partial update of [`ProfileFields`]; `None` leaves a field untouched.
///
/// The optional text fields take `Some(None)` (JSON `null`) to clear them.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProfilePatch {
    pub skills: Option<Vec<String>>,
    pub experience: Option<Experience>,
    pub portfolio: Option<Vec<PortfolioItem>>,
    #[serde(deserialize_with = "nullable")]
    pub bio: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub profile_picture: Option<Option<String>>,
    pub hourly_rate: Option<f64>,
    pub location: Option<Location>,
    pub languages: Option<Vec<Language>>,
    pub education: Option<Vec<Education>>,
    pub certifications: Option<Vec<Certification>>,
    pub availability: Option<Availability>,
    #[serde(deserialize_with = "nullable")]
    pub response_time: Option<Option<String>>,
    pub success_rate: Option<f64>,
}

/// Present keys map to `Some`, including an explicit `null`; absent keys fall back to `None`.
fn nullable<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FreelancerProfile {
    pub account_id: Uuid,
    #[serde(flatten)]
    pub fields: ProfileFields,
    pub completed_projects: u32,
    pub ongoing_projects: u32,
    pub total_earnings: f64,
    pub rating: Rating,
    pub reviews: Vec<Review>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl FreelancerProfile {
    pub fn new(account_id: Uuid, fields: ProfileFields) -> AppResult<Self> {
        let now = OffsetDateTime::now_utc();
        Ok(Self {
            account_id,
            fields: fields.validated()?,
            completed_projects: 0,
            ongoing_projects: 0,
            total_earnings: 0.0,
            rating: Rating::default(),
            reviews: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Appends a review and recomputes the rating from the whole collection.
    pub fn add_review(
        &mut self,
        client_id: Uuid,
        project_id: Uuid,
        rating: u8,
        comment: impl Into<String>,
    ) -> AppResult<()> {
        if !(RATING_MIN..=RATING_MAX).contains(&rating) {
            return Err(AppError::Validation(format!(
                "rating must be within {}..={}",
                RATING_MIN, RATING_MAX
            )));
        }
        self.reviews.push(Review {
            client_id,
            project_id,
            rating,
            comment: comment.into(),
            date: OffsetDateTime::now_utc(),
        });
        self.recompute_rating();
        self.touch();
        Ok(())
    }

    fn recompute_rating(&mut self) {
        let count = self.reviews.len();
        let total: u64 = self.reviews.iter().map(|r| u64::from(r.rating)).sum();
        self.rating = Rating {
            average: if count == 0 { 0.0 } else { total as f64 / count as f64 },
            count: count as u32,
        };
    }

    /// The only mutator of the project counters and earnings.
    pub fn record_project_transition(&mut self, project_value: f64, is_completed: bool) -> AppResult<()> {
        if !project_value.is_finite() || project_value < 0.0 {
            return Err(AppError::Validation("project value cannot be negative".into()));
        }
        if is_completed {
            let earnings = self.total_earnings + project_value;
            if !earnings.is_finite() {
                return Err(AppError::Validation("total earnings would overflow".into()));
            }
            self.completed_projects += 1;
            self.ongoing_projects = self.ongoing_projects.saturating_sub(1);
            self.total_earnings = earnings;
        } else {
            self.ongoing_projects += 1;
        }
        self.touch();
        Ok(())
    }

    /// Applies a patch; validation runs on the merged result before anything is kept.
    pub fn apply_patch(&mut self, patch: ProfilePatch) -> AppResult<()> {
        let mut f = self.fields.clone();
        if let Some(v) = patch.skills {
            f.skills = v;
        }
        if let Some(v) = patch.experience {
            f.experience = v;
        }
        if let Some(v) = patch.portfolio {
            f.portfolio = v;
        }
        if let Some(v) = patch.bio {
            f.bio = v;
        }
        if let Some(v) = patch.profile_picture {
            f.profile_picture = v;
        }
        if let Some(v) = patch.hourly_rate {
            f.hourly_rate = v;
        }
        if let Some(v) = patch.location {
            f.location = v;
        }
        if let Some(v) = patch.languages {
            f.languages = v;
        }
        if let Some(v) = patch.education {
            f.education = v;
        }
        if let Some(v) = patch.certifications {
            f.certifications = v;
        }
        if let Some(v) = patch.availability {
            f.availability = v;
        }
        if let Some(v) = patch.response_time {
            f.response_time = v;
        }
        if let Some(v) = patch.success_rate {
            f.success_rate = v;
        }
        self.fields = f.validated()?;
        self.touch();
        Ok(())
    }

    /// Share of the six checklist fields that are filled, 0..=100, rounded once.
    pub fn completion_score(&self) -> u8 {
        let f = &self.fields;
        let checks = [
            present(&f.bio),
            present(&f.profile_picture),
            !f.skills.is_empty(),
            !f.portfolio.is_empty(),
            f.hourly_rate > 0.0,
            present(&f.location.city),
        ];
        let per_field = 100.0 / checks.len() as f64;
        let total: f64 = checks.iter().filter(|c| **c).map(|_| per_field).sum();
        total.round() as u8
    }

    fn touch(&mut self) {
        self.updated_at = OffsetDateTime::now_utc();
    }
}

fn present(v: &Option<String>) -> bool {
    v.as_deref().is_some_and(|s| !s.trim().is_empty())
}
