//! Outbound notifications: template rendering and mail delivery.

use crate::error::RegistryError;
use crate::models::account::Account;
use crate::models::token::Token;
use include_dir::{Dir, include_dir};
use log::{info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

static TEMPLATES: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/templates");

const CONFIRM_SUBJECT: &str = "NApps Repository: Confirm your account";
const WELCOME_SUBJECT: &str = "Welcome to the NApps Repository";

/// Renders the bundled templates, substituting `{{ key }}` placeholders
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl TemplateRenderer {
    pub fn render(
        &self,
        name: &str,
        context: &BTreeMap<&str, String>,
    ) -> Result<String, RegistryError> {
        let file = TEMPLATES
            .get_file(format!("{name}.html"))
            .ok_or_else(|| RegistryError::DeliveryFailure(format!("Unknown template {name}")))?;
        let source = file.contents_utf8().ok_or_else(|| {
            RegistryError::DeliveryFailure(format!("Template {name} is not UTF-8"))
        })?;

        let mut output = String::with_capacity(source.len());
        let mut rest = source;
        while let Some(start) = rest.find("{{") {
            output.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find("}}") else {
                return Err(RegistryError::DeliveryFailure(format!(
                    "Unclosed placeholder in template {name}"
                )));
            };
            let key = after[..end].trim();
            let value = context.get(key).ok_or_else(|| {
                RegistryError::DeliveryFailure(format!("Template {name} needs {key}"))
            })?;
            output.push_str(&escape_html(value));
            rest = &after[end + 2..];
        }
        output.push_str(rest);

        Ok(output)
    }
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

impl EmailMessage {
    /// RFC 822 style rendering. Control characters are dropped from header values.
    pub fn to_rfc822(&self) -> String {
        format!(
            "From: {}\r\nTo: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\nContent-Type: text/html; charset=utf-8\r\n\r\n{}",
            header_value(&self.from),
            header_value(&self.to),
            header_value(&self.subject),
            self.html_body
        )
    }
}

fn header_value(value: &str) -> String {
    value.chars().filter(|c| !c.is_control()).collect()
}

pub trait Mailer: Send + Sync + Debug {
    fn send(&self, message: &EmailMessage) -> Result<(), RegistryError>;
}

/// Logs messages instead of delivering them
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), RegistryError> {
        info!("Mail to {}: {}", message.to, message.subject);
        Ok(())
    }
}

/// Drops each message as an `.eml` file into a directory
#[derive(Debug)]
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl Mailer for OutboxMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), RegistryError> {
        let deliver = || -> std::io::Result<PathBuf> {
            fs::create_dir_all(&self.dir)?;
            let path = self.dir.join(format!(
                "{}-{}.eml",
                chrono::Utc::now().format("%Y%m%d%H%M%S"),
                uuid::Uuid::new_v4().simple()
            ));
            fs::write(&path, message.to_rfc822())?;
            Ok(path)
        };

        let path = deliver().map_err(|e| {
            RegistryError::DeliveryFailure(format!("Could not queue mail to {}: {e}", message.to))
        })?;
        info!("Mail to {} queued at {}", message.to, path.display());
        Ok(())
    }
}

/// Outcome reported to callers of operations with a notification side effect
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationStatus {
    Sent,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    renderer: TemplateRenderer,
    mailer: Arc<dyn Mailer>,
    from: String,
    api_url: String,
    site_url: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, from: &str, api_url: &str, site_url: &str) -> Self {
        Self {
            renderer: TemplateRenderer,
            mailer,
            from: from.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            site_url: site_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn confirmation_url(&self, account: &Account, token: &Token) -> String {
        format!(
            "{}/users/{}/confirm/{}",
            self.api_url, account.username, token.hash
        )
    }

    pub fn send_confirmation(&self, account: &Account, token: &Token) -> NotificationStatus {
        let mut context = BTreeMap::new();
        context.insert("username", account.username.clone());
        context.insert("confirm_url", self.confirmation_url(account, token));
        context.insert("valid_hours", (token.expiration_secs / 3600).to_string());

        self.deliver(account, "confirm_user", CONFIRM_SUBJECT, &context)
    }

    pub fn send_welcome(&self, account: &Account) -> NotificationStatus {
        let mut context = BTreeMap::new();
        context.insert("username", account.username.clone());
        context.insert("site_url", self.site_url.clone());

        self.deliver(account, "welcome", WELCOME_SUBJECT, &context)
    }

    /// Delivery failures are logged and reported, never propagated
    fn deliver(
        &self,
        account: &Account,
        template: &str,
        subject: &str,
        context: &BTreeMap<&str, String>,
    ) -> NotificationStatus {
        let result = self.renderer.render(template, context).and_then(|html_body| {
            self.mailer.send(&EmailMessage {
                from: self.from.clone(),
                to: account.email.clone(),
                subject: subject.to_string(),
                html_body,
            })
        });

        match result {
            Ok(()) => NotificationStatus::Sent,
            Err(e) => {
                warn!("Notification {template} to {} failed: {e}", account.username);
                NotificationStatus::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct BrokenMailer;

    impl Mailer for BrokenMailer {
        fn send(&self, _: &EmailMessage) -> Result<(), RegistryError> {
            Err(RegistryError::DeliveryFailure("connection refused".to_string()))
        }
    }

    fn account() -> Account {
        Account {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            first_name: "Alice".to_string(),
            last_name: None,
            phone: None,
            city: None,
            state: None,
            country: None,
            password_hash: String::new(),
            enabled: false,
            created_at: Utc::now(),
        }
    }

    fn token() -> Token {
        Token {
            hash: "f".repeat(64),
            created_at: Utc::now(),
            owner: "alice".to_string(),
            expiration_secs: 86400,
        }
    }

    #[test]
    fn test_render_escapes_values() {
        let mut context = BTreeMap::new();
        context.insert("username", "<b>alice</b>".to_string());
        context.insert("site_url", "http://localhost".to_string());

        let html = TemplateRenderer.render("welcome", &context).unwrap();
        assert!(html.contains("&lt;b&gt;alice&lt;/b&gt;"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_headers_stay_on_one_line() {
        let message = EmailMessage {
            from: "no-reply@napps.local".to_string(),
            to: "alice@example.com\r\nBcc: eve@example.com".to_string(),
            subject: "Welcome".to_string(),
            html_body: "<p>hi</p>".to_string(),
        };

        let raw = message.to_rfc822();
        assert!(raw.contains("To: alice@example.comBcc: eve@example.com\r\n"));
        assert!(!raw.contains("\r\nBcc:"));
    }

    #[test]
    fn test_render_reports_missing_context() {
        let context = BTreeMap::new();
        assert!(matches!(
            TemplateRenderer.render("welcome", &context),
            Err(RegistryError::DeliveryFailure(_))
        ));
        assert!(TemplateRenderer.render("missing", &context).is_err());
    }

    #[test]
    fn test_confirmation_lands_in_outbox() {
        let dir = TempDir::new().unwrap();
        let notifier = Notifier::new(
            Arc::new(OutboxMailer::new(dir.path())),
            "no-reply@napps.local",
            "http://localhost:8000/api/",
            "http://localhost:8000",
        );

        assert_eq!(
            notifier.send_confirmation(&account(), &token()),
            NotificationStatus::Sent
        );

        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
        let mail = fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert!(mail.contains("To: alice@example.com"));
        assert!(mail.contains(&format!(
            "http://localhost:8000/api/users/alice/confirm/{}",
            "f".repeat(64)
        )));
        assert!(mail.contains("valid for 24 hours"));
    }

    #[test]
    fn test_delivery_failure_is_soft() {
        let notifier = Notifier::new(
            Arc::new(BrokenMailer),
            "no-reply@napps.local",
            "http://localhost/api",
            "http://localhost",
        );
        assert_eq!(
            notifier.send_welcome(&account()),
            NotificationStatus::Failed
        );
    }
}
