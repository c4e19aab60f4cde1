use super::domain::UserId;
use crate::config::AdminConfig;

/// Identity forwarded by the upstream auth gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub email: Option<String>,
    pub name: Option<String>,
}

impl Principal {
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            name: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Admins are identified by email; an empty allow-list means nobody is admin.
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
    emails: Vec<String>,
}

impl AdminPolicy {
    pub fn new(config: &AdminConfig) -> Self {
        Self {
            emails: config.emails.clone(),
        }
    }

    pub fn from_emails<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|email| email.as_ref().trim().to_ascii_lowercase())
                .filter(|email| !email.is_empty())
                .collect(),
        }
    }

    pub fn is_admin(&self, principal: &Principal) -> bool {
        principal.email.as_deref().is_some_and(|email| {
            let email = email.trim().to_ascii_lowercase();
            self.emails.iter().any(|admin| admin == &email)
        })
    }
}
