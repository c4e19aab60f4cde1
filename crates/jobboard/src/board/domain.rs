use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Identity handed to us by the upstream auth provider.
    UserId
);
id_type!(CompanyId);
id_type!(JobSeekerId);
id_type!(
    /// Identifier of a job post; also carried in checkout metadata.
    JobId
);
id_type!(ApplicationId);
id_type!(SavedJobId);
id_type!(JobViewId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserType {
    Company,
    JobSeeker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Option<String>,
    pub name: Option<String>,
    pub user_type: Option<UserType>,
    pub onboarding_completed: bool,
    pub payment_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: UserId, email: Option<String>, name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            email,
            name,
            user_type: None,
            onboarding_completed: false,
            payment_customer_id: None,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub user_id: UserId,
    pub name: String,
    pub location: String,
    pub about: String,
    pub logo: String,
    pub website: String,
    pub x_account: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSeeker {
    pub id: JobSeekerId,
    pub user_id: UserId,
    pub name: String,
    pub about: String,
    pub resume: String,
}

/// Lifecycle state of a job post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPostStatus {
    Draft,
    Active,
    Expired,
    Rejected,
}

impl JobPostStatus {
    pub const fn label(self) -> &'static str {
        match self {
            JobPostStatus::Draft => "DRAFT",
            JobPostStatus::Active => "ACTIVE",
            JobPostStatus::Expired => "EXPIRED",
            JobPostStatus::Rejected => "REJECTED",
        }
    }
}

impl fmt::Display for JobPostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPost {
    pub id: JobId,
    pub company_id: CompanyId,
    pub job_title: String,
    pub employment_type: String,
    pub location: String,
    pub salary_from: u32,
    pub salary_to: u32,
    pub job_description: String,
    /// Listing length in days, as purchased.
    pub listing_duration: u32,
    pub benefits: Vec<String>,
    pub status: JobPostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set on the transition into `Active`.
    pub activated_at: Option<DateTime<Utc>>,
}

impl JobPost {
    /// Instant after which an active listing should be expired.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.activated_at
            .map(|at| at + chrono::Duration::days(i64::from(self.listing_duration)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub resume: String,
    pub cover_letter: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedJobPost {
    pub id: SavedJobId,
    pub job_id: JobId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobView {
    pub id: JobViewId,
    pub job_id: JobId,
    pub user_id: Option<UserId>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}
