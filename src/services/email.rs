//! Email service for borrow reminders and onboarding messages

use chrono::NaiveDate;
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

/// A rendered notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub message: String,
}

impl Notification {
    pub fn borrowed(fullname: &str, title: &str, due_date: NaiveDate) -> Self {
        Self {
            subject: format!("You borrowed \"{}\"!", title),
            message: format!(
                "Hi {},\n\nYou've successfully borrowed the book \"{}\". Enjoy your reading! The due date is {}.",
                fullname,
                title,
                due_date.format("%Y-%m-%d")
            ),
        }
    }

    pub fn due_tomorrow(fullname: &str, title: &str) -> Self {
        Self {
            subject: format!("Reminder: \"{}\" is due tomorrow!", title),
            message: format!(
                "Hi {},\n\nThis is a reminder that the book \"{}\" is due tomorrow. Please return it on time to avoid late fees.",
                fullname, title
            ),
        }
    }

    pub fn last_day(fullname: &str, title: &str) -> Self {
        Self {
            subject: format!("Today is the last day to return \"{}\"!", title),
            message: format!(
                "Hi {},\n\nThis is the final reminder that today is the last day to return the book \"{}\". Please return it today.",
                fullname, title
            ),
        }
    }

    pub fn overdue(fullname: &str, title: &str) -> Self {
        Self {
            subject: format!("Overdue. Return the book \"{}\" to avoid charges.", title),
            message: format!(
                "Hi {},\n\nThe book \"{}\" is overdue. If you don't return it soon, you will be charged for the late return. Please return it as soon as possible.",
                fullname, title
            ),
        }
    }

    pub fn welcome(fullname: &str) -> Self {
        Self {
            subject: "Welcome to the platform".to_string(),
            message: format!("Hi {}, welcome to the platform!", fullname),
        }
    }

    pub fn inactive(fullname: &str) -> Self {
        Self {
            subject: "Hmm, it's been a while".to_string(),
            message: format!(
                "Hi {}, it's been a while since you last logged in. We hope you're doing well!",
                fullname
            ),
        }
    }

    pub fn still_active(fullname: &str) -> Self {
        Self {
            subject: "Woah, you're still here!".to_string(),
            message: format!(
                "Hi {}, it's good to see you active and learning new things!",
                fullname
            ),
        }
    }

    fn html(&self) -> String {
        format!(
            r#"<html><body><p>{}</p></body></html>"#,
            self.message.replace('\n', "<br>")
        )
    }
}

#[derive(Clone)]
pub struct EmailService {
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Send a notification to `to`
    pub async fn send(&self, to: &str, notification: &Notification) -> AppResult<()> {
        let email = self.build_message(to, notification)?;
        let mailer = self.mailer()?;

        tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AppError::Internal(format!("Email task failed: {}", e)))?
            .map_err(|e| AppError::External(format!("Failed to send email: {}", e)))?;

        tracing::info!("Sent \"{}\" to {}", notification.subject, to);
        Ok(())
    }

    fn build_message(&self, to: &str, notification: &Notification) -> AppResult<Message> {
        let from_name = self
            .config
            .smtp_from_name
            .as_deref()
            .unwrap_or("University Library");
        let from_mailbox = Mailbox::from_str(&format!("{} <{}>", from_name, self.config.smtp_from))
            .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?;

        let to_mailbox = Mailbox::from_str(to)
            .map_err(|e| AppError::BadRequest(format!("Invalid to address: {}", e)))?;

        Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(notification.subject.as_str())
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(notification.message.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(notification.html()),
                    ),
            )
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))
    }

    fn mailer(&self) -> AppResult<SmtpTransport> {
        let builder = if self.config.smtp_use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| AppError::Internal(format!("Failed to create SMTP transport: {}", e)))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        }
        .port(self.config.smtp_port);

        let builder = match (&self.config.smtp_username, &self.config.smtp_password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        Ok(builder.build())
    }
}
