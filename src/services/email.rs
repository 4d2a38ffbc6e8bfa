//! Email service delivering overdue notices over SMTP

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    SmtpTransport, Transport,
};
use std::str::FromStr;

use crate::{
    config::EmailConfig,
    error::{AppError, AppResult},
};

use super::overdue::Notifier;

/// Plain-text body of an overdue notice
pub fn overdue_notice_body(
    member_name: &str,
    item_name: &str,
    due_date_text: &str,
    organization_name: &str,
) -> String {
    format!(
        r#"Hello {member_name},

Our records show that "{item_name}" was due back on {due_date_text} and has not been returned yet.

Please return it as soon as possible, or get in touch with us if you need more time.

Thank you,
{organization_name}
"#
    )
}

/// HTML alternative of an overdue notice
fn overdue_notice_html(
    member_name: &str,
    item_name: &str,
    due_date_text: &str,
    organization_name: &str,
) -> String {
    format!(
        r#"<html><body>
<p>Hello {member_name},</p>
<p>Our records show that <strong>{item_name}</strong> was due back on <strong>{due_date_text}</strong> and has not been returned yet.</p>
<p>Please return it as soon as possible, or get in touch with us if you need more time.</p>
<p>Thank you,<br>{organization_name}</p>
</body></html>"#,
        member_name = escape_html(member_name),
        item_name = escape_html(item_name),
        due_date_text = escape_html(due_date_text),
        organization_name = escape_html(organization_name),
    )
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Send an overdue notice for one loan
    pub async fn send_overdue_notice(
        &self,
        to: &str,
        item_name: &str,
        member_name: &str,
        due_date_text: &str,
    ) -> AppResult<()> {
        let organization = &self.config.organization_name;
        let subject = format!("Overdue Item: {}", item_name);
        let text = overdue_notice_body(member_name, item_name, due_date_text, organization);
        let html = overdue_notice_html(member_name, item_name, due_date_text, organization);

        self.send_email(to, &subject, text, html).await
    }

    async fn send_email(&self, to: &str, subject: &str, text: String, html: String) -> AppResult<()> {
        if !self.config.enabled {
            return Err(AppError::Notification("Email delivery is disabled".to_string()));
        }

        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or(self.config.organization_name.as_str());
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::Notification(format!("Invalid recipient address '{}': {}", to, e)))?;

        let email = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        let mailer_builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Notification(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let mailer_builder = if let (Some(username), Some(password)) =
            (&self.config.smtp_username, &self.config.smtp_password)
        {
            mailer_builder.credentials(Credentials::new(username.clone(), password.clone()))
        } else {
            mailer_builder
        };

        let mailer = mailer_builder.build();

        // SmtpTransport is blocking
        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::Notification(format!("Failed to send email: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailService {
    async fn send(
        &self,
        address: &str,
        item_name: &str,
        member_name: &str,
        due_date_text: &str,
    ) -> AppResult<()> {
        self.send_overdue_notice(address, item_name, member_name, due_date_text)
            .await
    }
}
