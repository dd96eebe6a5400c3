use anyhow::{Context, Result};
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use accountable_types::lifecycle::INVITATION_TTL_DAYS;

use crate::config::Settings;

/// Outgoing mail over an SMTP relay with STARTTLS. A mailer built without
/// SMTP settings accepts every message and drops it.
pub struct Mailer {
    relay: Option<Relay>,
}

struct Relay {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Mailer {
    pub fn disabled() -> Self {
        Self { relay: None }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let Some(smtp) = &settings.smtp else {
            info!("SMTP not configured, outgoing email disabled");
            return Ok(Self::disabled());
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.server)
            .with_context(|| format!("invalid SMTP relay '{}'", smtp.server))?
            .port(smtp.port)
            .credentials(Credentials::new(smtp.username.clone(), smtp.password.clone()))
            .build();
        let from = smtp
            .username
            .parse()
            .context("SMTP_USERNAME must be an email address")?;

        info!("Email via {}:{}", smtp.server, smtp.port);
        Ok(Self {
            relay: Some(Relay { transport, from }),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.relay.is_some()
    }

    pub async fn send_html(&self, to: &str, subject: &str, html: String) -> Result<()> {
        let Some(relay) = &self.relay else {
            debug!("Email disabled, dropping '{}' to {}", subject, to);
            return Ok(());
        };

        let email = Message::builder()
            .from(relay.from.clone())
            .to(to.parse().with_context(|| format!("invalid recipient '{to}'"))?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)?;
        relay.transport.send(email).await?;

        info!("Sent email to {}", to);
        Ok(())
    }
}

#[derive(Debug)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub fn invitation_link(frontend_url: &str, token: &str) -> String {
    format!("{frontend_url}/register?invitation={token}")
}

/// Invitation to someone without an account to register and pair up.
pub fn invitation_email(
    app_name: &str,
    frontend_url: &str,
    inviter_name: &str,
    token: &str,
    message: Option<&str>,
) -> RenderedEmail {
    let app = escape_html(app_name);
    let inviter = escape_html(inviter_name);
    let link = escape_html(&invitation_link(frontend_url, token));
    let note = message
        .filter(|m| !m.trim().is_empty())
        .map(|m| {
            format!(
                r#"<div style="padding: 15px; border-left: 3px solid #ddd; margin: 20px 0;"><p><em>"{}"</em></p></div>"#,
                escape_html(m)
            )
        })
        .unwrap_or_default();

    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
    <h2 style="color: #333;">You've been invited to {app}!</h2>
    <p>{inviter} wants you to be their accountability partner to help them achieve their goals.</p>
    {note}
    <p>{app} pairs people with accountability partners for support, motivation and regular check-ins.</p>
    <div style="text-align: center; margin: 30px 0;">
        <a href="{link}" style="background-color: #4f46e5; color: white; padding: 12px 20px; text-decoration: none; border-radius: 4px; font-weight: bold;">Join {app}</a>
    </div>
    <p style="font-size: 0.9em; color: #666;">If you don't want to join, you can ignore this email. The invitation will expire in {INVITATION_TTL_DAYS} days.</p>
</div>"#
    );

    RenderedEmail {
        subject: format!("{inviter_name} wants to be your accountability partner on {app_name}"),
        html,
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}
