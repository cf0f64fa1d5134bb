use sqlx::{types::Json, FromRow};
use time::OffsetDateTime;
use uuid::Uuid;

use super::aggregate::{FreelancerProfile, ProfileFields, Rating, Review};
use crate::error::AppError;

/// Row shape of the `freelancer_profiles` table.
#[derive(Debug, FromRow)]
pub struct FreelancerRow {
    pub account_id: Uuid,
    pub fields: Json<ProfileFields>,
    pub completed_projects: i32,
    pub ongoing_projects: i32,
    pub total_earnings: f64,
    pub rating_average: f64,
    pub rating_count: i32,
    pub reviews: Json<Vec<Review>>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

fn non_negative(v: i32, column: &str) -> Result<u32, AppError> {
    u32::try_from(v).map_err(|_| AppError::Persistence(format!("stored {} is negative: {}", column, v)))
}

impl TryFrom<FreelancerRow> for FreelancerProfile {
    type Error = AppError;

    fn try_from(r: FreelancerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            account_id: r.account_id,
            fields: r.fields.0,
            completed_projects: non_negative(r.completed_projects, "completed_projects")?,
            ongoing_projects: non_negative(r.ongoing_projects, "ongoing_projects")?,
            total_earnings: r.total_earnings,
            rating: Rating {
                average: r.rating_average,
                count: non_negative(r.rating_count, "rating_count")?,
            },
            reviews: r.reviews.0,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::freelancers::aggregate::{
        Availability, Certification, Education, Experience, Language, Location, PortfolioItem,
        Proficiency,
    };

    fn populated() -> (ProfileFields, Vec<Review>) {
        let fields = ProfileFields {
            skills: vec!["rust".into(), "postgres".into()],
            experience: Experience::Expert,
            portfolio: vec![PortfolioItem {
                title: Some("Ledger".into()),
                url: Some("https://example.com/ledger".into()),
                ..Default::default()
            }],
            bio: Some("Backend engineer".into()),
            profile_picture: Some("https://cdn.example.com/me.png".into()),
            hourly_rate: 95.5,
            location: Location {
                city: Some("Porto".into()),
                country: Some("Portugal".into()),
                timezone: Some("Europe/Lisbon".into()),
            },
            languages: vec![Language {
                language: "Portuguese".into(),
                proficiency: Some(Proficiency::Native),
            }],
            education: vec![Education {
                degree: Some("MSc".into()),
                year: Some(2015),
                ..Default::default()
            }],
            certifications: vec![Certification {
                title: Some("CKA".into()),
                issuer: Some("CNCF".into()),
                date: Some(datetime!(2023-06-01 09:30 UTC)),
                url: None,
            }],
            availability: Availability::NotAvailable,
            response_time: Some("2 hours".into()),
            success_rate: 98.0,
        };
        let reviews = vec![Review {
            client_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            rating: 4,
            comment: "solid work".into(),
            date: datetime!(2024-02-29 18:05:07 UTC),
        }];
        (fields, reviews)
    }

    fn row(fields: &ProfileFields, reviews: &[Review], rating_count: i32) -> FreelancerRow {
        // Through JSON text, as the JSONB columns store them.
        let fields = serde_json::from_str(&serde_json::to_string(fields).unwrap()).unwrap();
        let reviews = serde_json::from_str(&serde_json::to_string(reviews).unwrap()).unwrap();
        FreelancerRow {
            account_id: Uuid::new_v4(),
            fields: Json(fields),
            completed_projects: 3,
            ongoing_projects: 1,
            total_earnings: 4200.0,
            rating_average: 4.0,
            rating_count,
            reviews: Json(reviews),
            created_at: datetime!(2024-01-01 00:00 UTC),
            updated_at: datetime!(2024-03-01 00:00 UTC),
        }
    }

    #[test]
    fn jsonb_columns_roundtrip_into_profile() {
        let (fields, reviews) = populated();
        let p = FreelancerProfile::try_from(row(&fields, &reviews, 1)).unwrap();

        assert_eq!(p.fields, fields);
        assert_eq!(p.fields.availability, Availability::NotAvailable);
        assert_eq!(
            p.fields.certifications[0].date,
            Some(datetime!(2023-06-01 09:30 UTC))
        );
        assert_eq!(p.reviews, reviews);
        assert_eq!(p.reviews[0].date, datetime!(2024-02-29 18:05:07 UTC));
        assert_eq!((p.completed_projects, p.ongoing_projects), (3, 1));
        assert_eq!(p.rating.count, 1);
        assert_eq!(p.completion_score(), 100);
    }

    #[test]
    fn negative_stored_count_is_persistence_error() {
        let (fields, reviews) = populated();
        let err = FreelancerProfile::try_from(row(&fields, &reviews, -1)).unwrap_err();
        assert!(matches!(err, AppError::Persistence(_)));
        assert!(err.to_string().contains("rating_count"));
    }
}
