//! # Discord Gateway
//!
//! Delivers reminders as Discord DMs through the serenity HTTP client. The
//! gateway holds no gateway/websocket connection; plain REST calls are
//! enough for outbound messages.
//!
//! - **Version**: 1.0.0
//! - **Since**: 2.0.0
//! - **Toggleable**: true

use async_trait::async_trait;
use log::{debug, warn};
use serenity::http::Http;
use serenity::model::id::UserId;
use std::sync::Arc;

use crate::features::dispatch::{
    DispatchGateway, DispatchPayload, MessageKind, Outcome, SkipReason,
};

pub struct DiscordGateway {
    http: Arc<Http>,
}

impl DiscordGateway {
    pub fn new(http: Arc<Http>) -> Self {
        DiscordGateway { http }
    }

    pub fn from_token(token: &str) -> Self {
        DiscordGateway {
            http: Arc::new(Http::new(token)),
        }
    }
}

#[async_trait]
impl DispatchGateway for DiscordGateway {
    async fn send(
        &self,
        recipient: &str,
        kind: MessageKind,
        payload: &DispatchPayload,
    ) -> Outcome {
        if recipient.is_empty() {
            return Outcome::Skipped(SkipReason::ChannelNotLinked);
        }

        let user_id = match recipient.parse::<u64>() {
            Ok(id) => UserId(id),
            Err(_) => {
                warn!("Dispatch target '{recipient}' is not a Discord user id");
                return Outcome::Failed(format!("invalid recipient id '{recipient}'"));
            }
        };

        let dm = match user_id.create_dm_channel(&self.http).await {
            Ok(channel) => channel,
            Err(e) => {
                return Outcome::Failed(format!("could not open DM channel: {e}"));
            }
        };

        match dm
            .send_message(&self.http, |m| m.content(&payload.content))
            .await
        {
            Ok(_) => {
                debug!("Dispatched {kind:?} to user {user_id}");
                Outcome::Sent
            }
            Err(e) => Outcome::Failed(format!("DM send failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Network-facing paths are covered by the mock gateway in the reminder
    // sweeper tests; here we only pin the local normalization rules.
    #[tokio::test]
    async fn test_blank_recipient_is_skipped() {
        let gateway = DiscordGateway::from_token("unused");
        let payload = DispatchPayload {
            content: "hi".to_string(),
        };
        let outcome = gateway
            .send("", MessageKind::GoalReminder, &payload)
            .await;
        assert_eq!(outcome, Outcome::Skipped(SkipReason::ChannelNotLinked));
    }

    #[tokio::test]
    async fn test_non_numeric_recipient_fails() {
        let gateway = DiscordGateway::from_token("unused");
        let payload = DispatchPayload {
            content: "hi".to_string(),
        };
        match gateway
            .send("not-a-snowflake", MessageKind::HabitSummary, &payload)
            .await
        {
            Outcome::Failed(reason) => assert!(reason.contains("invalid recipient")),
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
