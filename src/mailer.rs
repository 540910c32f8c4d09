use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    message::Mailbox,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

use crate::config::SmtpConfig;

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.host)?
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .port(cfg.port)
            .build();
        let from = format!("Rollcall <{}>", cfg.from)
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid from address: {e}"))?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid to address: {e}"))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())?;
        self.transport.send(email).await?;
        info!(to = %to, "email sent");
        Ok(())
    }
}

/// HTML body for the password-reset email, with the reset link embedded.
pub fn reset_password_body(name: &str, reset_link: &str) -> String {
    format!(
        "<div>\
         <h1>Hi! {name}</h1>\
         <h5 style=\"font-size: 14px;\">Your reset password link is: \
         <a href=\"{reset_link}\" style=\"color: blue; text-decoration: underline;\">{reset_link}</a></h5>\
         <p>The link expires in 15 minutes.</p>\
         <p>Thank you, {name}</p>\
         </div>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_body_contains_link_and_name() {
        let body = reset_password_body("Rahim", "http://localhost:3000/reset-password?token=abc");
        assert!(body.contains("Rahim"));
        assert!(body.contains("http://localhost:3000/reset-password?token=abc"));
        assert!(body.contains("expires in 15 minutes"));
    }

    #[tokio::test]
    async fn mock_mailer_records_sends() {
        struct MockMailer {
            sent: std::sync::Mutex<Vec<(String, String)>>,
        }

        #[async_trait]
        impl Mailer for MockMailer {
            async fn send(&self, to: &str, subject: &str, _html_body: &str) -> anyhow::Result<()> {
                self.sent
                    .lock()
                    .expect("lock")
                    .push((to.to_string(), subject.to_string()));
                Ok(())
            }
        }

        let mailer = MockMailer {
            sent: std::sync::Mutex::new(Vec::new()),
        };
        mailer
            .send("user@example.com", "Reset Password Link", "<div></div>")
            .await
            .expect("send should succeed");
        let sent = mailer.sent.lock().expect("lock");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "user@example.com");
        assert_eq!(sent[0].1, "Reset Password Link");
    }
}
