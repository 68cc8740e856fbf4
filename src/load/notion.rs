// src/load/notion.rs
// Notion-backed destination store. Upserts are keyed by the CanonicalId
// rich-text property: query-by-id decides between page create and patch.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::config::NotionParams;
use crate::error::StoreError;
use crate::item::{CanonicalId, EnrichedItem, RawPayload};
use crate::load::{ContentStore, UpsertStatus};

const NOTION_VERSION: &str = "2022-06-28";
/// Notion rejects rich-text payloads beyond this length.
const TEXT_LIMIT: usize = 2000;

pub struct NotionStore {
    http: reqwest::Client,
    token: String,
    database_id: String,
    base_url: String,
}

impl NotionStore {
    pub fn new(params: &NotionParams, http: reqwest::Client) -> Self {
        Self {
            http,
            token: params.token.clone(),
            database_id: format_uuid(&params.database_id),
            base_url: "https://api.notion.com/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    async fn send_checked(&self, req: reqwest::RequestBuilder) -> Result<Value, StoreError> {
        let resp = req.send().await.map_err(StoreError::from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }
        resp.json().await.map_err(StoreError::from_reqwest)
    }

    async fn find_page(&self, id: &CanonicalId) -> Result<Option<String>, StoreError> {
        let url = format!("{}/databases/{}/query", self.base_url, self.database_id);
        let payload = json!({
            "filter": {
                "property": "CanonicalId",
                "rich_text": { "equals": id.as_str() }
            }
        });
        let body = self
            .send_checked(self.request(reqwest::Method::POST, url).json(&payload))
            .await?;
        Ok(body["results"]
            .as_array()
            .and_then(|r| r.first())
            .and_then(|page| page["id"].as_str())
            .map(str::to_string))
    }

    fn properties(item: &EnrichedItem) -> Value {
        let raw = &item.raw;
        let mut props = json!({
            "Title": { "title": [{ "text": { "content": truncate(&raw.title, TEXT_LIMIT) } }] },
            "URL": { "url": &raw.url },
            "Source": { "select": { "name": &raw.source_name } },
            "Type": { "select": { "name": raw.source_kind.label() } },
            "PublishedAt": { "date": { "start": raw.published_at.to_rfc3339() } },
            "IngestedAt": { "date": { "start": Utc::now().to_rfc3339() } },
            "Importance": { "number": item.importance() },
            "CanonicalId": { "rich_text": [{ "text": { "content": raw.canonical_id().as_str() } }] },
        });

        if let Some(e) = &item.enrichment {
            props["Summary"] =
                json!({ "rich_text": [{ "text": { "content": truncate(&e.summary, TEXT_LIMIT) } }] });
            if !e.tags.is_empty() {
                let tags: Vec<Value> = e.tags.iter().map(|t| json!({ "name": t })).collect();
                props["Tags"] = json!({ "multi_select": tags });
            }
            if let Some(insight) = &e.actionable_insight {
                props["ActionableInsight"] =
                    json!({ "rich_text": [{ "text": { "content": truncate(insight, TEXT_LIMIT) } }] });
            }
            if !e.key_entities.is_empty() {
                let entities: Vec<Value> =
                    e.key_entities.iter().map(|p| json!({ "name": p })).collect();
                props["KeyEntities"] = json!({ "multi_select": entities });
            }
        }

        if let RawPayload::Video {
            channel_title,
            matched_person,
            ..
        } = &raw.raw_payload
        {
            props["VideoId"] =
                json!({ "rich_text": [{ "text": { "content": &raw.native_id } }] });
            props["Channel"] =
                json!({ "rich_text": [{ "text": { "content": channel_title } }] });
            if let Some(person) = matched_person {
                props["PeopleMatches"] = json!({ "multi_select": [{ "name": person }] });
            }
        }

        props
    }
}

#[async_trait]
impl ContentStore for NotionStore {
    async fn upsert(&self, item: &EnrichedItem) -> Result<UpsertStatus, StoreError> {
        let id = item.raw.canonical_id();
        let properties = Self::properties(item);

        match self.find_page(&id).await? {
            Some(page_id) => {
                let url = format!("{}/pages/{}", self.base_url, page_id);
                self.send_checked(
                    self.request(reqwest::Method::PATCH, url)
                        .json(&json!({ "properties": properties })),
                )
                .await?;
                Ok(UpsertStatus::Updated)
            }
            None => {
                let url = format!("{}/pages", self.base_url);
                let payload = json!({
                    "parent": { "database_id": self.database_id },
                    "properties": properties,
                });
                self.send_checked(self.request(reqwest::Method::POST, url).json(&payload))
                    .await?;
                Ok(UpsertStatus::Created)
            }
        }
    }

    /// Paginated sweep of the whole database, used to seed the known-id
    /// index when the local state file is missing.
    async fn known_ids(&self) -> Result<Vec<CanonicalId>, StoreError> {
        let url = format!("{}/databases/{}/query", self.base_url, self.database_id);
        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut payload = json!({ "page_size": 100 });
            if let Some(c) = &cursor {
                payload["start_cursor"] = json!(c);
            }
            let body = self
                .send_checked(self.request(reqwest::Method::POST, url.clone()).json(&payload))
                .await?;

            if let Some(results) = body["results"].as_array() {
                for page in results {
                    if let Some(id) =
                        page["properties"]["CanonicalId"]["rich_text"][0]["plain_text"].as_str()
                    {
                        ids.push(CanonicalId::from_stored(id));
                    }
                }
            }
            if body["has_more"].as_bool().unwrap_or(false) {
                cursor = body["next_cursor"].as_str().map(str::to_string);
                if cursor.is_none() {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(ids)
    }

    fn name(&self) -> &'static str {
        "notion"
    }
}

/// Notion accepts bare 32-char ids; normalize to the dashed form.
fn format_uuid(id: &str) -> String {
    if id.len() == 32 && !id.contains('-') {
        format!(
            "{}-{}-{}-{}-{}",
            &id[..8],
            &id[8..12],
            &id[12..16],
            &id[16..20],
            &id[20..]
        )
    } else {
        id.to_string()
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Enrichment, RawItem, SourceKind};

    #[test]
    fn bare_uuid_gets_dashes() {
        assert_eq!(
            format_uuid("0123456789abcdef0123456789abcdef"),
            "01234567-89ab-cdef-0123-456789abcdef"
        );
        assert_eq!(format_uuid("already-dashed"), "already-dashed");
    }

    #[test]
    fn properties_cover_enrichment_and_video_fields() {
        let item = EnrichedItem {
            raw: RawItem {
                source_kind: SourceKind::PersonAppearance,
                source_name: "Jane Doe".into(),
                native_id: "vid42".into(),
                title: "Interview".into(),
                url: "https://www.youtube.com/watch?v=vid42".into(),
                published_at: Utc::now(),
                raw_payload: RawPayload::Video {
                    description: "d".into(),
                    channel_title: "Some Pod".into(),
                    duration_secs: Some(3600),
                    is_short: false,
                    matched_person: Some("Jane Doe".into()),
                },
            },
            enrichment: Some(Enrichment {
                summary: "s".into(),
                tags: vec!["AI".into()],
                importance: 7,
                key_entities: vec!["Jane Doe".into()],
                actionable_insight: None,
            }),
        };

        let props = NotionStore::properties(&item);
        assert_eq!(props["CanonicalId"]["rich_text"][0]["text"]["content"], "vid:vid42");
        assert_eq!(props["Type"]["select"]["name"], "YouTube");
        assert_eq!(props["Importance"]["number"], 7);
        assert_eq!(props["Channel"]["rich_text"][0]["text"]["content"], "Some Pod");
        assert_eq!(props["PeopleMatches"]["multi_select"][0]["name"], "Jane Doe");
        assert!(props.get("ActionableInsight").is_none());
    }

    #[test]
    fn unenriched_items_get_default_importance() {
        let item = EnrichedItem::unenriched(RawItem {
            source_kind: SourceKind::ChannelUpload,
            source_name: "Acme Research".into(),
            native_id: "vid1".into(),
            title: "Talk".into(),
            url: "https://www.youtube.com/watch?v=vid1".into(),
            published_at: Utc::now(),
            raw_payload: RawPayload::Video {
                description: String::new(),
                channel_title: "Acme Research".into(),
                duration_secs: Some(1200),
                is_short: false,
                matched_person: None,
            },
        });
        let props = NotionStore::properties(&item);
        assert_eq!(props["Importance"]["number"], crate::item::DEFAULT_IMPORTANCE);
        assert!(props.get("Summary").is_none());
    }
}
