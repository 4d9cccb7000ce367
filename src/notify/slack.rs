use eyre::Result;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

/// Channel for trade notifications
const TRADES_CHANNEL: &str = "#arbitrator";
/// Channel for failures
const ERRORS_CHANNEL: &str = "#arbitrator-errors";

/// Slack notifier
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    /// The Slack OAuth token
    token: String,
    /// The HTTP client
    client: Client,
}

impl SlackNotifier {
    /// Create a new Slack notifier posting with `token`
    ///
    /// # Errors
    /// * If the HTTP client cannot be built
    pub fn new(token: &str) -> Result<Self> {
        // Create a client with a timeout
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            token: token.to_string(),
            client,
        })
    }

    /// Send a message to a specific channel
    ///
    /// # Errors
    /// * If the request fails or Slack answers with `ok: false`
    pub async fn send_to(&self, msg: &str, channel: &str) -> Result<()> {
        let payload = json!({
            "channel": channel,
            "text": msg,
            "username": "Arbitrator",
            "icon_emoji": ":scales:"
        });

        let response = self
            .client
            .post("https://slack.com/api/chat.postMessage")
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?
            .json::<serde_json::Value>()
            .await?;

        // Check if Slack API returned success
        if !response["ok"].as_bool().unwrap_or(false) {
            return Err(eyre::eyre!(
                "Slack API error: {}",
                response["error"].as_str().unwrap_or("unknown error")
            ));
        }

        Ok(())
    }

    /// Send a message to the trades channel
    ///
    /// # Errors
    /// * See [`SlackNotifier::send_to`]
    pub async fn send(&self, msg: &str) -> Result<()> {
        self.send_to(msg, TRADES_CHANNEL).await
    }

    /// Send an error message to the error channel
    ///
    /// # Errors
    /// * See [`SlackNotifier::send_to`]
    pub async fn send_error(&self, error: &str) -> Result<()> {
        self.send_to(&format!(":warning: Error: {error}"), ERRORS_CHANNEL)
            .await
    }
}
