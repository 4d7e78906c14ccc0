use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;

use crate::{
    config::SmtpSettings,
    models::{course::Course, payment::Payment, user::User},
};

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<()>;
}

/// Used when SMTP is not configured: the message only goes to the log.
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        tracing::info!("Email to {} ({}): {}", email.to, email.subject, email.body);
        Ok(())
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .with_context(|| format!("SMTP relay error for {}", settings.host))?
            .port(settings.port);

        if let (Some(user), Some(password)) = (&settings.user, &settings.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        let from = settings
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid from address: {}", settings.from))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email
                .to
                .parse::<Mailbox>()
                .with_context(|| format!("Invalid to address: {}", email.to))?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .context("Failed to build email")?;

        self.transport
            .send(message)
            .await
            .context("Failed to send email")?;

        Ok(())
    }
}

/// Picks the SMTP mailer when configured, the logging one otherwise.
pub fn mailer_from_settings(settings: Option<&SmtpSettings>) -> Result<Arc<dyn Mailer>> {
    match settings {
        Some(smtp) => Ok(Arc::new(SmtpMailer::new(smtp)?)),
        None => {
            tracing::warn!("SMTP_HOST not set, emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

pub struct NotificationService {
    mailer: Arc<dyn Mailer>,
    app_url: String,
}

impl NotificationService {
    pub fn new(mailer: Arc<dyn Mailer>, app_url: impl Into<String>) -> Self {
        Self {
            mailer,
            app_url: app_url.into(),
        }
    }

    pub fn payment_approved_email(&self, student: &User, course: &Course, payment: &Payment) -> OutgoingEmail {
        let course_url = format!("{}/courses/{}", self.app_url.trim_end_matches('/'), course.id);
        let body = format!(
            r#"Hello {},

Your payment for "{}" has been verified (reference {}).
You now have full access to the course recordings, quizzes and materials:
{}

Thank you for learning with us."#,
            student.name,
            course.title,
            payment.reference_number.as_deref().unwrap_or("-"),
            course_url
        );

        OutgoingEmail {
            to: student.email.clone(),
            subject: format!("Enrollment approved: {}", course.title),
            body,
        }
    }

    /// Best-effort: a failed send is logged and never surfaces to the caller.
    pub async fn notify_payment_approved(&self, student: &User, course: &Course, payment: &Payment) {
        let email = self.payment_approved_email(student, course, payment);
        if let Err(e) = self.mailer.send(email).await {
            tracing::error!(
                "Failed to send approval email for payment {} to {}: {:#}",
                payment.id,
                student.email,
                e
            );
        }
    }
}
