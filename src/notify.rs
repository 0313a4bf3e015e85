//! Best-effort side channels: SMTP mail and NATS domain events.
//!
//! Neither channel is allowed to fail a request. Sends run on detached tasks
//! and failures are logged at `warn`.

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::Config;
use crate::domain::events::AppEvent;

#[derive(Clone)]
pub struct Notifier {
    mailer: Option<Mailer>,
    nats: Option<async_nats::Client>,
}

#[derive(Clone)]
struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl Notifier {
    pub async fn connect(config: &Config) -> Self {
        let nats = match &config.nats_url {
            Some(url) => match async_nats::connect(url).await {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::warn!(error = %e, "NATS unavailable, events disabled");
                    None
                }
            },
            None => None,
        };

        let mailer = config.smtp.as_ref().and_then(|smtp| {
            let from = match smtp.from.parse::<Mailbox>() {
                Ok(from) => from,
                Err(e) => {
                    tracing::warn!(error = %e, "invalid SMTP_FROM, mail disabled");
                    return None;
                }
            };
            match AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.relay) {
                Ok(builder) => Some(Mailer {
                    transport: builder
                        .credentials(Credentials::new(smtp.username.clone(), smtp.password.clone()))
                        .build(),
                    from,
                }),
                Err(e) => {
                    tracing::warn!(error = %e, "SMTP relay unreachable, mail disabled");
                    None
                }
            }
        });

        Self { mailer, nats }
    }

    /// Fire-and-forget email. The HTTP request never waits on the relay.
    pub fn send_email(&self, to: &str, subject: &str, body: String) {
        let Some(mailer) = self.mailer.clone() else { return };
        let to = to.to_string();
        let subject = subject.to_string();
        tokio::spawn(async move {
            let recipient: Mailbox = match to.parse() {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(%to, error = %e, "skipping mail to unparseable address");
                    return;
                }
            };
            let message = Message::builder()
                .from(mailer.from.clone())
                .to(recipient)
                .subject(subject.clone())
                .body(body);
            match message {
                Ok(message) => {
                    if let Err(e) = mailer.transport.send(message).await {
                        tracing::warn!(%to, %subject, error = %e, "mail delivery failed");
                    }
                }
                Err(e) => tracing::warn!(%to, %subject, error = %e, "mail build failed"),
            }
        });
    }

    /// Publishes a domain event when a broker is configured.
    pub fn publish(&self, event: AppEvent) {
        let Some(client) = self.nats.clone() else { return };
        tokio::spawn(async move {
            let subject = event.subject();
            match serde_json::to_vec(&event) {
                Ok(payload) => {
                    if let Err(e) = client.publish(subject.to_string(), payload.into()).await {
                        tracing::warn!(subject, error = %e, "event publish failed");
                    }
                }
                Err(e) => tracing::warn!(subject, error = %e, "event serialization failed"),
            }
        });
    }
}
