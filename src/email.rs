use crate::models::{AdminRequest, User};
use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, Address, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

/// Where admin request notifications go. Built once from [`crate::config::Config`].
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub relay: String,
    pub credentials: Option<Credentials>,
    pub sender: Option<Address>,
    pub recipients: Vec<Address>,
}

impl NotificationConfig {
    pub fn parse_recipients(raw: &str) -> anyhow::Result<Vec<Address>> {
        raw.split(',')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(|addr| {
                addr.parse::<Address>()
                    .with_context(|| format!("invalid recipient address `{addr}`"))
            })
            .collect()
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some() && !self.recipients.is_empty()
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn admin_request_created(
        &self,
        request: &AdminRequest,
        requester: &User,
    ) -> anyhow::Result<()>;
}

pub struct EmailNotifier {
    config: NotificationConfig,
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl EmailNotifier {
    pub fn new(config: NotificationConfig) -> anyhow::Result<EmailNotifier> {
        let mailer = if config.is_enabled() {
            let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.relay)?;
            if let Some(creds) = &config.credentials {
                builder = builder.credentials(creds.clone());
            }
            Some(builder.build())
        } else {
            tracing::info!("no admin request recipients configured, notifications are off");
            None
        };

        Ok(EmailNotifier { config, mailer })
    }

    pub async fn sanity_check(&self) -> anyhow::Result<()> {
        if let Some(mailer) = &self.mailer {
            anyhow::ensure!(
                mailer.test_connection().await?,
                "smtp relay `{}` refused the connection",
                self.config.relay
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn admin_request_created(
        &self,
        request: &AdminRequest,
        requester: &User,
    ) -> anyhow::Result<()> {
        let Some(mailer) = &self.mailer else {
            return Ok(());
        };
        let Some(email) = admin_request_message(&self.config, request, requester)? else {
            return Ok(());
        };

        mailer.send(email).await?;
        tracing::debug!(request_id = request.id, "admin request notification sent");
        Ok(())
    }
}

pub fn admin_request_message(
    config: &NotificationConfig,
    request: &AdminRequest,
    requester: &User,
) -> anyhow::Result<Option<Message>> {
    let Some(sender) = &config.sender else {
        return Ok(None);
    };
    if config.recipients.is_empty() {
        return Ok(None);
    }

    let target = request
        .target_post_id
        .map_or_else(|| "-".to_string(), |id| format!("#{id}"));
    let body = format!(
        r"A new admin request is waiting for review.

Type: {}
Title: {}
Requester: {} ({})
Target post: {}

{}",
        request.request_type,
        request.title,
        requester.nickname,
        requester.username,
        target,
        request.content,
    );

    let mut builder = Message::builder()
        .from(Mailbox::new(
            Some("Club Recruit Hub".to_string()),
            sender.clone(),
        ))
        .subject(format!("[admin request] {}", request.title));
    for recipient in &config.recipients {
        builder = builder.to(Mailbox::new(None, recipient.clone()));
    }

    Ok(Some(builder.body(body)?))
}

/// Sends the notification, logging instead of failing when delivery breaks.
pub async fn notify_admins(notifier: &dyn Notifier, request: &AdminRequest, requester: &User) {
    if let Err(err) = notifier.admin_request_created(request, requester).await {
        tracing::warn!(
            request_id = request.id,
            error = ?err,
            "failed to send admin request notification"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codes::{Affiliation, DevLevel, Field, RequestStatus, RequestType};
    use chrono::{TimeZone, Utc};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    fn requester() -> User {
        User {
            id: 4,
            username: "jiwoo".to_string(),
            nickname: "지우".to_string(),
            email: "jiwoo@example.com".to_string(),
            password_hash: String::new(),
            phone: None,
            address: None,
            interest_field: Field::Backend,
            affiliation: Affiliation::StudentCs,
            dev_level: DevLevel::Novice,
            is_active: true,
            is_staff: false,
            date_joined: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    fn request() -> AdminRequest {
        let at = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        AdminRequest {
            id: 11,
            requester_id: 4,
            target_post_id: Some(2),
            request_type: RequestType::Update,
            title: "Fix the deadline".to_string(),
            content: "Applications close in April, not March.".to_string(),
            status: RequestStatus::Processing,
            reviewer_id: None,
            review_comment: String::new(),
            created_at: at,
            updated_at: at,
        }
    }

    fn config(recipients: &str) -> NotificationConfig {
        NotificationConfig {
            relay: "smtp.example.com".to_string(),
            credentials: None,
            sender: Some("hub@example.com".parse().unwrap()),
            recipients: NotificationConfig::parse_recipients(recipients).unwrap(),
        }
    }

    #[test]
    fn recipients_skip_blanks() {
        let recipients = NotificationConfig::parse_recipients(" a@example.com, ,b@example.com,").unwrap();
        assert_eq!(recipients.len(), 2);
        assert_eq!(recipients[1].to_string(), "b@example.com");
    }

    #[test]
    fn bad_recipients_are_config_errors() {
        assert!(NotificationConfig::parse_recipients("a@example.com,nobody").is_err());
    }

    #[test]
    fn message_goes_to_every_recipient() {
        let message = admin_request_message(
            &config("a@example.com,b@example.com"),
            &request(),
            &requester(),
        )
        .unwrap()
        .unwrap();

        assert_eq!(message.envelope().to().len(), 2);
        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Fix the deadline"));
    }

    #[test]
    fn no_recipients_means_no_message() {
        let message = admin_request_message(&config(""), &request(), &requester()).unwrap();
        assert!(message.is_none());
        assert!(!config("").is_enabled());
    }

    struct FailingNotifier(Arc<AtomicUsize>);

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn admin_request_created(&self, _: &AdminRequest, _: &User) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("smtp relay unreachable")
        }
    }

    #[tokio::test]
    async fn delivery_failures_are_swallowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let notifier = FailingNotifier(calls.clone());

        notify_admins(&notifier, &request(), &requester()).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
