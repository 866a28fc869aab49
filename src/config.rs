use crate::{auth::AuthKeys, email::NotificationConfig};
use anyhow::Context;
use envconfig::Envconfig;
use lettre::{transport::smtp::authentication::Credentials, Address};

#[derive(Envconfig)]
pub struct Config {
    #[envconfig(from = "DATABASE_URL")]
    pub db_url: String,
    #[envconfig(from = "PORT", default = "8080")]
    pub port: u16,
    #[envconfig(from = "JWT_SECRET")]
    pub jwt_secret: String,
    #[envconfig(from = "SMTP_RELAY", default = "smtp.gmail.com")]
    pub smtp_relay: String,
    #[envconfig(from = "EMAIL_USERNAME")]
    pub email_username: Option<String>,
    #[envconfig(from = "EMAIL_PASSWORD")]
    pub email_password: Option<String>,
    #[envconfig(from = "ADMIN_REQUEST_RECIPIENTS", default = "")]
    pub admin_request_recipients: String,
}

impl Config {
    pub fn auth_keys(&self) -> anyhow::Result<AuthKeys> {
        AuthKeys::from_base64_secret(&self.jwt_secret).context("JWT_SECRET is not valid base64")
    }

    pub fn notification(&self) -> anyhow::Result<NotificationConfig> {
        let sender = self
            .email_username
            .as_deref()
            .map(|username| {
                username
                    .parse::<Address>()
                    .context("EMAIL_USERNAME must be an email address")
            })
            .transpose()?;
        let credentials = match (&self.email_username, &self.email_password) {
            (Some(username), Some(password)) => {
                Some(Credentials::new(username.clone(), password.clone()))
            }
            _ => None,
        };

        Ok(NotificationConfig {
            relay: self.smtp_relay.clone(),
            credentials,
            sender,
            recipients: NotificationConfig::parse_recipients(&self.admin_request_recipients)
                .context("ADMIN_REQUEST_RECIPIENTS is malformed")?,
        })
    }
}
