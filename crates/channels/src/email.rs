//! Email notifier — sends the run digest over SMTP.
//!
//! The SMTP password is never stored in the config file; `password_env`
//! names the environment variable holding it.

use async_trait::async_trait;
use lettre::message::{Attachment, Mailbox, Message, MultiPart, SinglePart, header};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};
use papertriage_config::EmailConfig;
use papertriage_core::error::DispatchError;
use papertriage_core::notify::{DigestMessage, Notifier};
use tracing::{info, warn};

/// Delivers digests to the configured recipients.
pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Build the MIME message for `digest`.
    ///
    /// The digest markdown is the plain-text body; the digest file, when
    /// present and readable, is attached as `text/markdown`.
    pub fn build_message(&self, digest: &DigestMessage) -> Result<Message, DispatchError> {
        if self.config.recipients.is_empty() {
            return Err(DispatchError::NotConfigured(
                "email.recipients is empty".into(),
            ));
        }

        let from: Mailbox = self.config.sender.parse().map_err(|e| {
            DispatchError::InvalidMessage(format!(
                "invalid sender address \"{}\": {e}",
                self.config.sender
            ))
        })?;

        let mut builder = Message::builder().from(from).subject(&self.config.subject);
        for addr in &self.config.recipients {
            let mailbox: Mailbox = addr.parse().map_err(|e| {
                DispatchError::InvalidMessage(format!("invalid recipient \"{addr}\": {e}"))
            })?;
            builder = builder.to(mailbox);
        }

        let text = SinglePart::builder()
            .header(header::ContentType::TEXT_PLAIN)
            .body(digest.body.clone());

        let mut body = MultiPart::mixed().singlepart(text);

        if let Some(path) = &digest.attachment {
            match std::fs::read(path) {
                Ok(bytes) => {
                    let filename = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "digest.md".into());
                    let content_type = header::ContentType::parse("text/markdown; charset=utf-8")
                        .map_err(|e| DispatchError::InvalidMessage(e.to_string()))?;
                    body = body.singlepart(Attachment::new(filename).body(bytes, content_type));
                }
                Err(e) => {
                    // The body already carries the full digest.
                    warn!(path = %path.display(), error = %e, "Digest attachment unreadable, sending body only");
                }
            }
        }

        builder
            .multipart(body)
            .map_err(|e| DispatchError::InvalidMessage(format!("failed to build MIME message: {e}")))
    }

    fn credentials(&self) -> Result<Option<Credentials>, DispatchError> {
        let Some(username) = self.config.username.as_deref().filter(|u| !u.is_empty()) else {
            return Ok(None);
        };
        let Some(var) = self.config.password_env.as_deref().filter(|v| !v.is_empty()) else {
            return Err(DispatchError::NotConfigured(
                "email.username is set but email.password_env is not".into(),
            ));
        };
        let password =
            std::env::var(var).map_err(|_| DispatchError::MissingCredential(var.to_string()))?;
        Ok(Some(Credentials::new(username.to_string(), password)))
    }

    fn transport(&self) -> Result<SmtpTransport, DispatchError> {
        let mut builder = if self.config.use_tls {
            SmtpTransport::starttls_relay(&self.config.smtp_host)
                .map_err(|e| DispatchError::Transport(e.to_string()))?
        } else {
            SmtpTransport::builder_dangerous(&self.config.smtp_host)
        };
        builder = builder.port(self.config.smtp_port);
        if let Some(creds) = self.credentials()? {
            builder = builder.credentials(creds);
        }
        Ok(builder.build())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn dispatch(&self, digest: &DigestMessage) -> Result<(), DispatchError> {
        let message = self.build_message(digest)?;
        let transport = self.transport()?;
        let host = self.config.smtp_host.clone();

        // SmtpTransport is blocking.
        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        info!(
            host = %host,
            recipients = self.config.recipients.len(),
            entries = digest.entry_count,
            "Digest emailed"
        );
        Ok(())
    }
}
