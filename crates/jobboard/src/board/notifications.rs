use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Trait describing the transactional email provider.
pub trait Mailer: Send + Sync {
    fn send(&self, email: OutboundEmail) -> Result<(), MailError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MailError {
    #[error("email transport unavailable: {0}")]
    Transport(String),
}

/// Mailer used when no provider is configured: emails are logged, not sent.
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

impl Mailer for LogMailer {
    fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
        info!(
            from = %self.from,
            to = %email.to,
            subject = %email.subject,
            "email provider not configured; logging instead of sending"
        );
        Ok(())
    }
}

/// Keeps every email in memory so callers can assert on what went out.
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent().into_iter().map(|email| email.subject).collect()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: OutboundEmail) -> Result<(), MailError> {
        self.sent
            .lock()
            .map_err(|_| MailError::Transport("recording mutex poisoned".to_string()))?
            .push(email);
        Ok(())
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Digest line for one job posting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestEntry {
    pub job_title: String,
    pub company_name: String,
    pub location: String,
    pub salary_from: u32,
    pub salary_to: u32,
}

pub mod templates {
    use super::{escape, DigestEntry, OutboundEmail};

    pub fn job_approved(to: &str, job_title: &str, job_url: &str) -> OutboundEmail {
        OutboundEmail {
            to: to.to_string(),
            subject: "Your job post has been approved".to_string(),
            html: format!(
                "<p>Your job post <strong>{}</strong> has been approved and is now live.</p>\
                 <p><a href=\"{}\">View job post</a></p>",
                escape(job_title),
                escape(job_url)
            ),
        }
    }

    pub fn job_rejected(to: &str, job_title: &str) -> OutboundEmail {
        OutboundEmail {
            to: to.to_string(),
            subject: "Your job post was rejected".to_string(),
            html: format!(
                "<p>Your job post <strong>{}</strong> was rejected. \
                 Please review the content and try again.</p>",
                escape(job_title)
            ),
        }
    }

    pub fn job_expiring_soon(to: &str, job_title: &str, job_url: &str, days_left: u32) -> OutboundEmail {
        OutboundEmail {
            to: to.to_string(),
            subject: "Your job post is expiring soon".to_string(),
            html: format!(
                "<p>Your job post <strong>{}</strong> will expire in {days_left} days.</p>\
                 <p><a href=\"{}\">View job post</a></p>",
                escape(job_title),
                escape(job_url)
            ),
        }
    }

    pub fn job_expired(to: &str, job_title: &str) -> OutboundEmail {
        OutboundEmail {
            to: to.to_string(),
            subject: "Your job post has expired".to_string(),
            html: format!(
                "<p>Your job post <strong>{}</strong> has expired.</p>",
                escape(job_title)
            ),
        }
    }

    pub fn job_seeker_welcome(to: &str, name: Option<&str>) -> OutboundEmail {
        let name = name.filter(|name| !name.trim().is_empty()).unwrap_or("there");
        OutboundEmail {
            to: to.to_string(),
            subject: "Welcome to JobBoard".to_string(),
            html: format!(
                "<p>Hi {}, welcome to JobBoard! \
                 We'll keep you updated with new job opportunities.</p>",
                escape(name)
            ),
        }
    }

    pub fn job_digest(to: &str, entries: &[DigestEntry]) -> OutboundEmail {
        let body: String = entries
            .iter()
            .map(|entry| {
                format!(
                    "<div style=\"margin-bottom:20px;padding:15px;border:1px solid #eee;border-radius:5px\">\
                     <h1 style=\"margin:0;\">{}</h1>\
                     <p style=\"margin:5px 0\">{} * {}</p>\
                     <p style=\"margin:5px;\">${} - ${}</p></div>",
                    escape(&entry.job_title),
                    escape(&entry.company_name),
                    escape(&entry.location),
                    entry.salary_from,
                    entry.salary_to
                )
            })
            .collect();
        OutboundEmail {
            to: to.to_string(),
            subject: "Latest job opportunities for you".to_string(),
            html: body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn templates_escape_user_content() {
        let email = templates::job_expired("owner@acme.test", "<script>alert(1)</script>");
        assert!(email.html.contains("&lt;script&gt;"));
        assert!(!email.html.contains("<script>"));
    }

    #[test]
    fn welcome_falls_back_to_generic_greeting() {
        let email = templates::job_seeker_welcome("sam@example.com", Some("  "));
        assert!(email.html.starts_with("<p>Hi there,"));
    }

    #[test]
    fn recording_mailer_keeps_order() {
        let mailer = RecordingMailer::default();
        mailer
            .send(templates::job_rejected("a@example.com", "First"))
            .expect("send");
        mailer
            .send(templates::job_expired("a@example.com", "Second"))
            .expect("send");
        assert_eq!(
            mailer.subjects(),
            vec![
                "Your job post was rejected".to_string(),
                "Your job post has expired".to_string()
            ]
        );
    }
}
