use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use signoff_core::config::NotifyConfig;
use signoff_core::workflow::ports::TaskDispatcher;
use signoff_core::{StoreError, Task};

/// Posts dispatched tasks to a configured webhook so external channels can
/// ping the assignee. Delivery is best-effort: the persisted task row is the
/// source of truth, so webhook failures are logged and swallowed.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    auth_token: Option<SecretString>,
}

impl WebhookNotifier {
    pub fn from_config(notify: &NotifyConfig) -> Option<Self> {
        let url = notify.webhook_url.clone()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(notify.timeout_secs))
            .build()
            .ok()?;
        Some(Self { client, url, auth_token: notify.auth_token.clone() })
    }

    async fn send(&self, task: &Task) -> Result<(), reqwest::Error> {
        let mut request = self.client.post(&self.url).json(task);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }
        request.send().await?.error_for_status()?;
        Ok(())
    }
}

/// Wraps the persistent task board with optional webhook fan-out.
pub struct NotifyingDispatcher<D> {
    inner: D,
    notifier: Option<WebhookNotifier>,
}

impl<D> NotifyingDispatcher<D> {
    pub fn new(inner: D, notifier: Option<WebhookNotifier>) -> Self {
        Self { inner, notifier }
    }
}

#[async_trait::async_trait]
impl<D> TaskDispatcher for NotifyingDispatcher<D>
where
    D: TaskDispatcher,
{
    async fn dispatch(&self, task: Task) -> Result<(), StoreError> {
        self.inner.dispatch(task.clone()).await?;

        if let Some(notifier) = &self.notifier {
            if let Err(error) = notifier.send(&task).await {
                warn!(
                    event_name = "system.notify.webhook_failed",
                    correlation_id = "dispatch",
                    task_id = %task.id.0,
                    assigned_to = %task.assigned_to,
                    error = %error,
                    "task webhook delivery failed; task remains on the board"
                );
            }
        }

        Ok(())
    }
}
