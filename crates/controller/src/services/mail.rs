//! MailService
//!
//! Used to have a clean interface for the various kinds of mails that are
//! sent on event and registration lifecycle changes. Sending is always
//! best-effort: the callers dispatch after their primary write committed and
//! only log failures.

use crate::settings::SharedSettings;
use anyhow::{Context, Result};
use db_storage::events::Event;
use db_storage::users::User;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;

#[derive(Clone)]
pub struct MailService {
    settings: SharedSettings,
    transport: Option<SmtpTransport>,
}

impl MailService {
    /// Creates the service from the current settings
    ///
    /// Without an `[smtp]` section in the settings the service is disabled
    /// and every send becomes a logged no-op.
    pub fn new(settings: SharedSettings) -> Result<Self> {
        let transport = match settings.load().smtp.as_ref() {
            Some(smtp) => {
                let transport = SmtpTransport::relay(&smtp.server)
                    .context("Failed to create SMTP transport")?
                    .port(smtp.port)
                    .credentials(Credentials::new(
                        smtp.username.clone(),
                        smtp.password.clone(),
                    ))
                    .timeout(Some(Duration::from_secs(smtp.timeout_secs)))
                    .build();

                Some(transport)
            }
            None => {
                log::warn!("No SMTP settings configured, mail notifications are disabled");
                None
            }
        };

        Ok(Self {
            settings,
            transport,
        })
    }

    /// Service with notifications disabled, used in tests
    pub fn disabled(settings: SharedSettings) -> Self {
        Self {
            settings,
            transport: None,
        }
    }

    fn from_mailbox(&self) -> Result<Mailbox> {
        let settings = self.settings.load();
        let smtp = settings
            .smtp
            .as_ref()
            .context("SMTP settings missing while a transport exists")?;

        format!("{} <{}>", smtp.from_name, smtp.from_email)
            .parse()
            .context("Invalid from address")
    }

    /// Sends the already built message on the blocking thread pool
    async fn send(&self, message: Message) -> Result<()> {
        let Some(transport) = self.transport.clone() else {
            log::debug!("Mail notifications disabled, dropping message");
            return Ok(());
        };

        tokio::task::spawn_blocking(move || {
            transport.send(&message).context("Failed to send mail")
        })
        .await
        .context("Mail task failed")??;

        Ok(())
    }

    /// Announces a freshly published event to every user
    pub async fn send_event_created(&self, recipients: Vec<String>, event: &Event) -> Result<()> {
        if self.transport.is_none() {
            log::debug!("Mail notifications disabled, skipping event creation mail");
            return Ok(());
        }

        if recipients.is_empty() {
            return Ok(());
        }

        let mut builder = Message::builder()
            .from(self.from_mailbox()?)
            .subject(format!("New Event Launched: {}", event.title));

        for recipient in &recipients {
            builder = builder.to(recipient.parse().context("Invalid recipient address")?);
        }

        let message = builder
            .header(ContentType::TEXT_PLAIN)
            .body(event_created_body(event))
            .context("Failed to build event creation mail")?;

        self.send(message).await
    }

    /// Notifies every user about a cancelled event, blind-copied
    pub async fn send_event_cancelled(&self, recipients: Vec<String>, event: &Event) -> Result<()> {
        if self.transport.is_none() {
            log::debug!("Mail notifications disabled, skipping cancellation mail");
            return Ok(());
        }

        if recipients.is_empty() {
            return Ok(());
        }

        let mut builder = Message::builder()
            .from(self.from_mailbox()?)
            .subject(format!("Event Cancelled: {}", event.title));

        for recipient in &recipients {
            builder = builder.bcc(recipient.parse().context("Invalid recipient address")?);
        }

        let message = builder
            .header(ContentType::TEXT_HTML)
            .body(event_cancelled_body(event))
            .context("Failed to build cancellation mail")?;

        self.send(message).await
    }

    /// Confirms a registration to the student, with a few event suggestions
    pub async fn send_registration_confirmation(
        &self,
        user: &User,
        event: &Event,
        suggestions: &[Event],
    ) -> Result<()> {
        if self.transport.is_none() {
            log::debug!("Mail notifications disabled, skipping registration mail");
            return Ok(());
        }

        let message = Message::builder()
            .from(self.from_mailbox()?)
            .to(user.email.parse().context("Invalid recipient address")?)
            .subject(format!("Registered: {}", event.title))
            .header(ContentType::TEXT_PLAIN)
            .body(registration_confirmation_body(user, event, suggestions))
            .context("Failed to build registration mail")?;

        self.send(message).await
    }
}

fn event_created_body(event: &Event) -> String {
    format!(
        "Hello,\n\n\
         A new event \"{title}\" has just been launched!\n\n\
         Date: {date}\n\
         {mode_details}\n\
         Description: {description}\n\n\
         Click below to register:\n\
         {registration_link}\n\n\
         Best regards,\n\
         SAC Team",
        title = event.title,
        date = event.date.format("%d.%m.%Y %H:%M %Z"),
        mode_details = event.mode_details(),
        description = event.description1.as_deref().unwrap_or(""),
        registration_link = event.registration_link,
    )
}

fn event_cancelled_body(event: &Event) -> String {
    format!(
        r#"<div style="font-family: Arial, sans-serif; line-height: 1.6;">
  <h2 style="color: #d32f2f;">Event Cancelled</h2>
  <p>Dear Participant</p>

  <p>We regret to inform you that the event <b>"{title}"</b> has been <b style="color: red;">cancelled</b>.</p>

  <p><b>Original Date:</b> {date}</p>
  <p><b>Mode:</b> {mode_details}</p>

  <p>We apologize for any inconvenience caused due to this cancellation. Thank you for your understanding.</p>

  <h4>Need Help?</h4>
  <p>
    <b>Organizer:</b> {organizer}<br/>
    <b>Representative:</b> {representative}<br/>
    <b>Phone:</b> {phone}<br/>
    <b>Email:</b> {email}
  </p>

  <p>Warm regards,<br/>
  <b>SAC Team</b></p>
</div>"#,
        title = event.title,
        date = event.date.format("%d.%m.%Y %H:%M %Z"),
        mode_details = event.mode_details(),
        organizer = event.organizer,
        representative = event.representative,
        phone = event.phone_number_representative,
        email = event.email_representative,
    )
}

fn registration_confirmation_body(user: &User, event: &Event, suggestions: &[Event]) -> String {
    let mut body = format!(
        "Hi {username},\n\n\
         You have successfully registered for the event: \"{title}\"!\n\n\
         Date & Time: {date}\n\
         {mode_details}\n\n\
         We are excited to see you there!\n",
        username = user.username,
        title = event.title,
        date = event.date.format("%d.%m.%Y %H:%M %Z"),
        mode_details = event.mode_details(),
    );

    if !suggestions.is_empty() {
        body.push_str("\nHere are a few other events you might be interested in:\n");

        for suggestion in suggestions {
            body.push_str(&format!(
                "- {}: {}\n",
                suggestion.title, suggestion.registration_link
            ));
        }
    }

    body.push_str("\nBest regards,\nSAC Team");

    body
}
