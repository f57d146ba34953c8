//! Status email delivery over SMTP.

use anyhow::{bail, Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;
use tracing::{debug, info, warn};

/// Where and how to send the status email.
#[derive(Debug, Clone)]
pub struct MailSettings {
    /// SMTP relay host.
    pub smtp_server: String,
    /// SMTP relay port.
    pub smtp_port: u16,
    /// Upgrade the connection with STARTTLS.
    pub starttls: bool,
    /// Login name, if the relay requires authentication.
    pub username: Option<String>,
    /// Password for `username`.
    pub password: Option<String>,
    /// Sender address.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
}

impl MailSettings {
    /// Build settings from the config file section. The password is read
    /// from the environment variable the section names.
    pub fn from_config(config: &crate::config::MailConfig) -> Self {
        Self {
            smtp_server: config.smtp_server.clone(),
            smtp_port: config.smtp_port,
            starttls: config.starttls,
            username: config.username.clone(),
            password: std::env::var(&config.password_env).ok(),
            from: config.from.clone(),
            to: config.to.clone(),
        }
    }
}

/// Build the status message, attaching `attachment` when it is a readable file.
///
/// A missing attachment is logged and the message is sent without it.
pub fn build_message(
    settings: &MailSettings,
    subject: &str,
    body: &str,
    attachment: Option<&Path>,
) -> Result<Message> {
    if settings.to.is_empty() {
        bail!("No email recipients configured");
    }

    let from: Mailbox = settings
        .from
        .parse()
        .with_context(|| format!("Invalid sender address: {}", settings.from))?;

    let mut builder = Message::builder().from(from).subject(subject);
    for recipient in &settings.to {
        let to: Mailbox = recipient
            .parse()
            .with_context(|| format!("Invalid recipient address: {}", recipient))?;
        builder = builder.to(to);
    }

    let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(body.to_string()));

    match attachment {
        Some(path) if path.is_file() => {
            let content = std::fs::read(path)
                .with_context(|| format!("Failed to read attachment {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "attachment".to_string());
            let content_type = ContentType::parse("application/octet-stream")
                .context("Invalid attachment content type")?;
            debug!("Attaching {} ({} bytes)", filename, content.len());
            parts = parts.singlepart(Attachment::new(filename).body(content, content_type));
        }
        Some(path) => {
            warn!(
                "Attachment {} does not exist or is not accessible, sending without it",
                path.display()
            );
        }
        None => {}
    }

    builder.multipart(parts).context("Failed to build email")
}

/// Deliver `message` through the configured relay.
pub async fn send_email(settings: &MailSettings, message: Message) -> Result<()> {
    let builder = if settings.starttls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_server)
            .with_context(|| format!("Invalid SMTP relay: {}", settings.smtp_server))?
    } else {
        // Plain connection, as used by internal relays on port 587
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.smtp_server)
    };
    let mut transport = builder.port(settings.smtp_port);

    if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
        transport = transport.credentials(Credentials::new(user.clone(), pass.clone()));
    }

    transport
        .build()
        .send(message)
        .await
        .with_context(|| {
            format!(
                "Failed to send email via {}:{}",
                settings.smtp_server, settings.smtp_port
            )
        })?;

    info!("Email sent to {}", settings.to.join(", "));
    Ok(())
}
