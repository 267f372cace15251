use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

use crate::{config::SmtpConfig, error::Error};

/// SMTP mail channel. Without credentials it degrades to a no-op that only
/// logs, which is also what the tests run against.
#[derive(Clone)]
pub enum Mailer {
    Smtp {
        transport: AsyncSmtpTransport<Tokio1Executor>,
        from: Mailbox,
    },
    Disabled,
}

impl Mailer {
    pub fn from_config(config: Option<&SmtpConfig>) -> Result<Self, Error> {
        let config = match config {
            Some(config) => config,
            None => return Ok(Self::Disabled),
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|err| Error::Mail(err.into()))?
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        let from = config
            .from
            .parse()
            .map_err(|err: lettre::address::AddressError| Error::Mail(err.into()))?;

        Ok(Self::Smtp { transport, from })
    }

    pub async fn send(&self, subject: &str, body: &str, to: &str) -> Result<(), Error> {
        let (transport, from) = match self {
            Self::Smtp { transport, from } => (transport, from),
            Self::Disabled => {
                tracing::debug!("mail disabled, dropping \"{}\" to {}", subject, to);
                return Ok(());
            }
        };

        let to: Mailbox = to
            .parse()
            .map_err(|err: lettre::address::AddressError| Error::Mail(err.into()))?;

        let message = Message::builder()
            .from(from.clone())
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|err| Error::Mail(err.into()))?;

        transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|err| Error::Mail(err.into()))
    }

    /// Fire-and-forget dispatch; a failure is logged, never surfaced.
    pub fn send_detached(&self, subject: String, body: String, to: String) {
        let mailer = self.clone();

        tokio::spawn(async move {
            if let Err(err) = mailer.send(&subject, &body, &to).await {
                tracing::error!("failed to send \"{}\" to {}: {:?}", subject, to, err);
            }
        });
    }
}
