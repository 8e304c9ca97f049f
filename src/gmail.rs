use crate::error::{Error, Result};
use crate::models::RawEmail;
use crate::pipeline::{MessageSource, MutationSink};
use async_trait::async_trait;
use chrono::Utc;
use google_gmail1::Gmail;
use google_gmail1::api::{MessagePart, ModifyMessageRequest};
use hyper::client::HttpConnector;
use hyper_rustls::HttpsConnector;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

const USER: &str = "me";
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Clone)]
pub struct GmailClient {
    hub: Gmail<HttpsConnector<HttpConnector>>,
    page_size: u32,
    show_progress: bool,
}

impl GmailClient {
    pub fn new(hub: Gmail<HttpsConnector<HttpConnector>>, page_size: u32) -> Self {
        Self {
            hub,
            page_size,
            show_progress: true,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Page through `users.messages.list` and collect every message id.
    pub async fn list_message_ids(&self, query: Option<&str>) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .hub
                .users()
                .messages_list(USER)
                .max_results(self.page_size);

            if let Some(q) = query {
                req = req.q(q);
            }
            if let Some(token) = &page_token {
                req = req.page_token(token);
            }

            let (_, message_list) = req
                .doit()
                .await
                .map_err(|e| Error::gmail("Failed to list messages", e))?;

            let batch: Vec<String> = message_list
                .messages
                .unwrap_or_default()
                .into_iter()
                .filter_map(|m| m.id)
                .collect();
            info!(count = batch.len(), "Fetched message ids in this batch");
            if batch.is_empty() {
                break;
            }
            ids.extend(batch);

            match message_list.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(ids)
    }

    pub async fn get_message(&self, id: &str) -> Result<RawEmail> {
        let (_, msg) = self
            .hub
            .users()
            .messages_get(USER, id)
            .format("full")
            .doit()
            .await
            .map_err(|e| Error::gmail(format!("Failed to get message {id}"), e))?;

        let mut from = String::new();
        let mut subject = String::new();
        let mut date = String::new();
        let mut body = String::new();

        match &msg.payload {
            Some(payload) => {
                for header in payload.headers.iter().flatten() {
                    let value = header.value.clone().unwrap_or_default();
                    match header.name.as_deref().map(str::to_lowercase).as_deref() {
                        Some("from") => from = value,
                        Some("subject") => subject = value,
                        Some("date") => date = value,
                        _ => {}
                    }
                }
                body = extract_text_body(payload, "text/plain")
                    .or_else(|| extract_text_body(payload, "text/html"))
                    .unwrap_or_default();
            }
            None => warn!(message_id = %id, "Message has no payload"),
        }

        debug!(message_id = %id, "Extracted message details");

        Ok(RawEmail {
            message_id: msg.id.unwrap_or_else(|| id.to_string()),
            thread_id: msg.thread_id.unwrap_or_default(),
            from,
            subject,
            date_received: date,
            labels: msg.label_ids.unwrap_or_default(),
            message: body,
        })
    }

    pub async fn modify_message(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        let req = ModifyMessageRequest {
            add_label_ids: Some(add.to_vec()),
            remove_label_ids: Some(remove.to_vec()),
            ..Default::default()
        };
        self.hub
            .users()
            .messages_modify(req, USER, id)
            .doit()
            .await
            .map_err(|e| Error::gmail(format!("Failed to modify message {id}"), e))?;

        info!(message_id = %id, ?add, ?remove, "Modified message labels");
        Ok(())
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("=> "));
        }
        pb.set_message("Processing emails");
        pb
    }
}

/// Gmail search query for messages newer than `look_back_days`.
pub fn look_back_query(look_back_days: u32, now_epoch: i64) -> String {
    let after = now_epoch - i64::from(look_back_days) * SECONDS_PER_DAY;
    format!("after:{after}")
}

#[async_trait]
impl MessageSource for GmailClient {
    async fn fetch_messages(&self, look_back_days: Option<u32>) -> Result<Vec<RawEmail>> {
        let query = look_back_days.map(|days| look_back_query(days, Utc::now().timestamp()));
        match &query {
            Some(q) => info!(query = %q, "Fetching messages"),
            None => info!("Fetching all messages, no look back provided"),
        }

        let ids = self.list_message_ids(query.as_deref()).await?;
        info!(count = ids.len(), "Received message ids from Gmail");

        let pb = self.progress_bar(ids.len());
        let mut emails = Vec::with_capacity(ids.len());
        for id in &ids {
            emails.push(self.get_message(id).await?);
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!(count = emails.len(), "Fetched message details");
        Ok(emails)
    }
}

#[async_trait]
impl MutationSink for GmailClient {
    async fn modify_labels(&self, message_id: &str, add: &[String], remove: &[String]) -> Result<()> {
        self.modify_message(message_id, add, remove).await
    }
}

/// Concatenate the decoded bodies of every part with `mime_type`.
fn extract_text_body(part: &MessagePart, mime_type: &str) -> Option<String> {
    if part.mime_type.as_deref() == Some(mime_type) {
        if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_ref()) {
            return Some(decode_body(data));
        }
    }

    let mut full_body = String::new();
    for p in part.parts.iter().flatten() {
        if let Some(body) = extract_text_body(p, mime_type) {
            full_body.push_str(&body);
        }
    }
    (!full_body.is_empty()).then_some(full_body)
}

/// Body data normally arrives already decoded; fall back to base64url when
/// it still looks encoded.
fn decode_body(data: &[u8]) -> String {
    use base64::{Engine as _, engine::general_purpose};

    let text = String::from_utf8_lossy(data);
    let trimmed = text.trim();
    let looks_encoded = !trimmed.is_empty()
        && trimmed
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'='));

    if looks_encoded {
        let decoded = general_purpose::URL_SAFE
            .decode(trimmed)
            .or_else(|_| general_purpose::URL_SAFE_NO_PAD.decode(trimmed));
        if let Ok(bytes) = decoded {
            if let Ok(s) = String::from_utf8(bytes) {
                return s;
            }
        }
    }
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use google_gmail1::api::MessagePartBody;

    fn leaf(mime: &str, data: &[u8]) -> MessagePart {
        MessagePart {
            mime_type: Some(mime.to_string()),
            body: Some(MessagePartBody {
                data: Some(data.to_vec()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn look_back_query_subtracts_days() {
        assert_eq!(look_back_query(7, 1_000_000), format!("after:{}", 1_000_000 - 7 * 86_400));
    }

    #[test]
    fn extracts_nested_plain_text() {
        let root = MessagePart {
            mime_type: Some("multipart/alternative".into()),
            parts: Some(vec![
                leaf("text/plain", b"Hello "),
                leaf("text/html", b"<p>ignored</p>"),
                MessagePart {
                    mime_type: Some("multipart/mixed".into()),
                    parts: Some(vec![leaf("text/plain", b"world")]),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        };
        assert_eq!(extract_text_body(&root, "text/plain").as_deref(), Some("Hello world"));
    }

    #[test]
    fn missing_mime_type_yields_none() {
        let root = leaf("text/html", b"<p>hi</p>");
        assert_eq!(extract_text_body(&root, "text/plain"), None);
    }

    #[test]
    fn decodes_base64url_bodies() {
        // "Hi there!" in base64url
        assert_eq!(decode_body(b"SGkgdGhlcmUh"), "Hi there!");
        assert_eq!(decode_body(b"plain text body"), "plain text body");
    }
}
