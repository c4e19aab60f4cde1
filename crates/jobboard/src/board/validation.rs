use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Field-level validation failure. Keys are the JSON field names.
#[derive(Debug, Clone, PartialEq, Eq, Default, thiserror::Error)]
#[error("invalid input: {}", summary(.fields))]
pub struct ValidationErrors {
    pub fields: BTreeMap<String, String>,
}

fn summary(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{field} {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_insert_with(|| message.into());
    }

    fn min_chars(&mut self, field: &str, value: &str, min: usize) {
        let len = value.trim().chars().count();
        if len == 0 {
            self.add(field, "is required");
        } else if len < min {
            self.add(field, format!("must be at least {min} characters"));
        }
    }

    fn into_result(self) -> Result<(), Self> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

fn trimmed(value: String) -> String {
    value.trim().to_string()
}

fn trimmed_optional(value: Option<String>) -> Option<String> {
    value.map(trimmed).filter(|value| !value.is_empty())
}

pub fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    match rest {
        Some(rest) => {
            let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
            !host.is_empty() && !host.contains(char::is_whitespace)
        }
        None => false,
    }
}

pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.contains(char::is_whitespace)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInput {
    pub name: String,
    pub location: String,
    pub about: String,
    pub logo: String,
    pub website: String,
    #[serde(default)]
    pub x_account: Option<String>,
}

impl CompanyInput {
    pub fn validated(self) -> Result<Self, ValidationErrors> {
        let input = Self {
            name: trimmed(self.name),
            location: trimmed(self.location),
            about: trimmed(self.about),
            logo: trimmed(self.logo),
            website: trimmed(self.website),
            x_account: trimmed_optional(self.x_account),
        };

        let mut errors = ValidationErrors::default();
        errors.min_chars("name", &input.name, 2);
        errors.min_chars("location", &input.location, 1);
        errors.min_chars("about", &input.about, 10);
        errors.min_chars("logo", &input.logo, 1);
        if !is_http_url(&input.website) {
            errors.add("website", "must be a valid URL");
        }
        errors.into_result()?;
        Ok(input)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSeekerInput {
    pub name: String,
    pub about: String,
    pub resume: String,
}

impl JobSeekerInput {
    pub fn validated(self) -> Result<Self, ValidationErrors> {
        let input = Self {
            name: trimmed(self.name),
            about: trimmed(self.about),
            resume: trimmed(self.resume),
        };

        let mut errors = ValidationErrors::default();
        errors.min_chars("name", &input.name, 2);
        errors.min_chars("about", &input.about, 10);
        errors.min_chars("resume", &input.resume, 1);
        errors.into_result()?;
        Ok(input)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInput {
    pub job_title: String,
    pub employment_type: String,
    pub location: String,
    pub salary_from: u32,
    pub salary_to: u32,
    pub job_description: String,
    pub listing_duration: u32,
    #[serde(default)]
    pub benefits: Vec<String>,
}

impl JobInput {
    pub fn validated(self) -> Result<Self, ValidationErrors> {
        let input = Self {
            job_title: trimmed(self.job_title),
            employment_type: trimmed(self.employment_type),
            location: trimmed(self.location),
            salary_from: self.salary_from,
            salary_to: self.salary_to,
            job_description: trimmed(self.job_description),
            listing_duration: self.listing_duration,
            benefits: self
                .benefits
                .into_iter()
                .map(trimmed)
                .filter(|benefit| !benefit.is_empty())
                .collect(),
        };

        let mut errors = ValidationErrors::default();
        errors.min_chars("job_title", &input.job_title, 2);
        errors.min_chars("employment_type", &input.employment_type, 1);
        errors.min_chars("location", &input.location, 1);
        errors.min_chars("job_description", &input.job_description, 1);
        if input.salary_from == 0 {
            errors.add("salary_from", "must be greater than zero");
        }
        if input.salary_to == 0 {
            errors.add("salary_to", "must be greater than zero");
        } else if input.salary_to < input.salary_from {
            errors.add("salary_to", "must not be lower than salary_from");
        }
        if input.listing_duration == 0 {
            errors.add("listing_duration", "must be at least one day");
        }
        if input.benefits.is_empty() {
            errors.add("benefits", "select at least one benefit");
        }
        errors.into_result()?;
        Ok(input)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInput {
    pub name: String,
    pub email: String,
    pub resume: String,
    #[serde(default)]
    pub cover_letter: Option<String>,
}

impl ApplicationInput {
    pub fn validated(self) -> Result<Self, ValidationErrors> {
        let input = Self {
            name: trimmed(self.name),
            email: trimmed(self.email),
            resume: trimmed(self.resume),
            cover_letter: trimmed_optional(self.cover_letter),
        };

        let mut errors = ValidationErrors::default();
        errors.min_chars("name", &input.name, 2);
        if !is_email(&input.email) {
            errors.add("email", "must be a valid email address");
        }
        errors.min_chars("resume", &input.resume, 1);
        errors.into_result()?;
        Ok(input)
    }
}
