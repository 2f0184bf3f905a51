//! License key delivery over SMTP.

use async_trait::async_trait;
use keyhub_core::config::SmtpConfig;
use keyhub_core::error::{KeyHubError, Result};
use keyhub_core::traits::Mailer;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;

/// Subject and plain-text body of the license email.
pub fn license_email(product: &str, client_name: &str, license_key: &str) -> (String, String) {
    let subject = format!("Your {product} license key");
    let body = format!(
        "Hello {client_name},\n\n\
         Thank you for registering with {product}.\n\n\
         Here is your license key:\n\n    {license_key}\n\n\
         Enter it in the {product} application to activate your license on your machine.\n\n\
         Best regards,\nThe {product} team\n"
    );
    (subject, body)
}

/// Sends license emails through an authenticated STARTTLS relay.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    product: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig, product: &str) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| KeyHubError::email(format!("SMTP relay {}: {e}", config.host)))?
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();
        let from = config
            .sender()
            .parse::<Mailbox>()
            .map_err(|e| KeyHubError::email(format!("Invalid sender '{}': {e}", config.sender())))?;
        Ok(Self { transport, from, product: product.to_string() })
    }

    fn build_message(&self, to_email: &str, client_name: &str, license_key: &str) -> Result<Message> {
        let to = to_email
            .parse::<Mailbox>()
            .map_err(|e| KeyHubError::email(format!("Invalid recipient '{to_email}': {e}")))?;
        let (subject, body) = license_email(&self.product, client_name, license_key);
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| KeyHubError::email(format!("Build message: {e}")))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send_license_key(&self, to_email: &str, client_name: &str, license_key: &str) -> Result<()> {
        let message = self.build_message(to_email, client_name, license_key)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| KeyHubError::email(format!("SMTP send to {to_email}: {e}")))?;
        tracing::info!("📧 License email sent to {to_email}");
        Ok(())
    }
}

/// Used when SMTP is not configured: logs and drops the message.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn send_license_key(&self, to_email: &str, _client_name: &str, _license_key: &str) -> Result<()> {
        tracing::warn!("SMTP not configured, skipping license email to {to_email}");
        Ok(())
    }
}

/// Pick the mailer for this configuration.
pub fn mailer_from_config(config: &SmtpConfig, product: &str) -> Result<Arc<dyn Mailer>> {
    if config.is_configured() {
        Ok(Arc::new(SmtpMailer::new(config, product)?))
    } else {
        Ok(Arc::new(DisabledMailer))
    }
}

/// Send a license email, logging instead of failing.
pub async fn deliver_license_key(mailer: &dyn Mailer, to_email: &str, client_name: &str, license_key: &str) -> bool {
    match mailer.send_license_key(to_email, client_name, license_key).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Error sending license email via {} to {to_email}: {e}", mailer.name());
            false
        }
    }
}
