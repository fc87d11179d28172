//! Bots Long Poll transport.
//!
//! Holds the server key and event cursor for one community and turns
//! `message_new` events into [`IncomingMessage`]s.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use super::client::VkClient;
use super::types::{IncomingMessage, LongPollServer};
use crate::errors::VkError;

/// What one `a_check` response asks the poller to do
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Events received; continue from `ts`
    Events { ts: String, messages: Vec<IncomingMessage> },
    /// History partially lost; continue from the new `ts`
    UpdateTs { ts: String },
    /// Key expired; request a new key, keep `ts`
    RefreshKey,
    /// Key and history lost; request new key and `ts`
    RefreshAll,
}

/// Interpret the body of an `a_check` response
pub fn parse_poll_response(body: &Value) -> Result<PollOutcome, VkError> {
    if let Some(failed) = body.get("failed").and_then(Value::as_i64) {
        return match failed {
            1 => Ok(PollOutcome::UpdateTs {
                ts: value_to_string(body.get("ts")).ok_or_else(|| {
                    VkError::UnexpectedResponse("failed=1 without ts".to_string())
                })?,
            }),
            2 => Ok(PollOutcome::RefreshKey),
            3 => Ok(PollOutcome::RefreshAll),
            other => Err(VkError::UnexpectedResponse(format!(
                "unknown long poll failure code {other}"
            ))),
        };
    }

    let ts = value_to_string(body.get("ts"))
        .ok_or_else(|| VkError::UnexpectedResponse("long poll response without ts".to_string()))?;

    let messages = body
        .get("updates")
        .and_then(Value::as_array)
        .map(|updates| updates.iter().filter_map(parse_message_new).collect())
        .unwrap_or_default();

    Ok(PollOutcome::Events { ts, messages })
}

/// Extract a user text message from one update, ignoring everything else
fn parse_message_new(update: &Value) -> Option<IncomingMessage> {
    if update.get("type").and_then(Value::as_str) != Some("message_new") {
        return None;
    }
    let object = update.get("object")?;
    let message = object.get("message")?;

    let from_id = message.get("from_id").and_then(Value::as_i64)?;
    if from_id <= 0 {
        // Communities and outgoing echoes
        return None;
    }

    Some(IncomingMessage {
        from_id,
        peer_id: message
            .get("peer_id")
            .and_then(Value::as_i64)
            .unwrap_or(from_id),
        text: message
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        lang_id: object
            .get("client_info")
            .and_then(|info| info.get("lang_id"))
            .and_then(Value::as_i64),
    })
}

fn value_to_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Long-poll session for one community
pub struct LongPollClient {
    client: VkClient,
    group_id: i64,
    wait_secs: u64,
    server: Option<LongPollServer>,
}

impl LongPollClient {
    pub fn new(client: VkClient, group_id: i64, wait_secs: u64) -> Self {
        Self {
            client,
            group_id,
            wait_secs,
            server: None,
        }
    }

    async fn connect(&mut self) -> Result<LongPollServer, VkError> {
        let server = self.client.get_long_poll_server(self.group_id).await?;
        info!(group_id = self.group_id, "Connected to long poll server");
        Ok(server)
    }

    /// Block until the server delivers the next batch of messages
    ///
    /// Returns an empty batch when the server times out the request or asks
    /// for a reconnect.
    pub async fn poll(&mut self) -> Result<Vec<IncomingMessage>, VkError> {
        // The session survives a failed request so the next poll resumes from the same ts
        let server = match &self.server {
            Some(server) => server.clone(),
            None => {
                let server = self.connect().await?;
                self.server = Some(server.clone());
                server
            }
        };

        let body: Value = self
            .client
            .http()
            .get(&server.server)
            .query(&[
                ("act", "a_check".to_string()),
                ("key", server.key.clone()),
                ("ts", server.ts.clone()),
                ("wait", self.wait_secs.to_string()),
            ])
            // The shared client timeout is shorter than a long-poll wait
            .timeout(Duration::from_secs(self.wait_secs + 10))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match parse_poll_response(&body)? {
            PollOutcome::Events { ts, messages } => {
                debug!(count = messages.len(), "Long poll batch received");
                self.server = Some(LongPollServer { ts, ..server });
                Ok(messages)
            }
            PollOutcome::UpdateTs { ts } => {
                warn!("Long poll history lost, continuing from new ts");
                self.server = Some(LongPollServer { ts, ..server });
                Ok(Vec::new())
            }
            PollOutcome::RefreshKey => {
                debug!("Long poll key expired, refreshing");
                let fresh = self.connect().await?;
                self.server = Some(LongPollServer {
                    ts: server.ts,
                    ..fresh
                });
                Ok(Vec::new())
            }
            PollOutcome::RefreshAll => {
                warn!("Long poll state lost, reconnecting");
                self.server = None;
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_new_is_extracted() {
        let body = json!({
            "ts": "15",
            "updates": [
                {
                    "type": "message_new",
                    "object": {
                        "message": {"from_id": 42, "peer_id": 42, "text": "Начать"},
                        "client_info": {"lang_id": 0}
                    }
                },
                {"type": "message_typing_state", "object": {"from_id": 42}},
                {
                    "type": "message_new",
                    "object": {"message": {"from_id": -5, "peer_id": 42, "text": "echo"}}
                }
            ]
        });

        let outcome = parse_poll_response(&body).unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Events {
                ts: "15".to_string(),
                messages: vec![IncomingMessage {
                    from_id: 42,
                    peer_id: 42,
                    text: "Начать".to_string(),
                    lang_id: Some(0),
                }],
            }
        );
    }

    #[test]
    fn test_failure_codes() {
        assert_eq!(
            parse_poll_response(&json!({"failed": 1, "ts": 30})).unwrap(),
            PollOutcome::UpdateTs {
                ts: "30".to_string()
            }
        );
        assert_eq!(
            parse_poll_response(&json!({"failed": 2})).unwrap(),
            PollOutcome::RefreshKey
        );
        assert_eq!(
            parse_poll_response(&json!({"failed": 3})).unwrap(),
            PollOutcome::RefreshAll
        );
        assert!(parse_poll_response(&json!({"failed": 9})).is_err());
    }

    #[test]
    fn test_empty_batch() {
        let outcome = parse_poll_response(&json!({"ts": "16", "updates": []})).unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Events {
                ts: "16".to_string(),
                messages: vec![]
            }
        );
    }
}
