//! Google Slides REST backend.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::backend::{deck_title, SlideSpec, SlideType, SlidesBackend};
use crate::error::{BridgeError, Result};
use crate::provider::http::{bearer_headers, shared_client, status_to_error};
use crate::session::Credential;

pub const DEFAULT_SLIDES_BASE_URL: &str = "https://slides.googleapis.com";

/// Talks to the Slides v1 API with the session's OAuth access token.
#[derive(Debug, Clone)]
pub struct GoogleSlides {
    base_url: String,
}

impl GoogleSlides {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_SLIDES_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post(&self, credential: &Credential, url: String, body: &Value) -> Result<Value> {
        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(credential.expose()))
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &text));
        }
        Ok(resp.json().await?)
    }

    async fn batch_update(&self, credential: &Credential, presentation_id: &str, requests: Vec<Value>) -> Result<()> {
        let url = format!("{}/v1/presentations/{presentation_id}:batchUpdate", self.base_url);
        self.post(credential, url, &json!({ "requests": requests })).await?;
        Ok(())
    }
}

impl Default for GoogleSlides {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedPresentation {
    presentation_id: String,
    #[serde(default)]
    slides: Vec<Page>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page {
    #[serde(default)]
    page_elements: Vec<PageElement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageElement {
    object_id: String,
}

fn object_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

fn insert_text(object_id: &str, text: &str) -> Value {
    json!({ "insertText": { "objectId": object_id, "text": text, "insertionIndex": 0 } })
}

/// Requests that append one title-and-body slide.
fn custom_slide_requests(slide: &SlideSpec) -> Vec<Value> {
    let slide_id = object_id("slide");
    let title_id = object_id("title");
    let body_id = object_id("body");

    let mut requests = vec![
        json!({
            "createSlide": {
                "objectId": slide_id,
                "slideLayoutReference": { "predefinedLayout": "TITLE_AND_BODY" },
                "placeholderIdMappings": [
                    { "layoutPlaceholder": { "type": "TITLE", "index": 0 }, "objectId": title_id },
                    { "layoutPlaceholder": { "type": "BODY", "index": 0 }, "objectId": body_id }
                ]
            }
        }),
        insert_text(&title_id, &slide.title),
        insert_text(&body_id, &slide.content),
    ];
    if slide.slide_type == SlideType::Bullet {
        requests.push(json!({
            "createParagraphBullets": {
                "objectId": body_id,
                "textRange": { "type": "ALL" },
                "bulletPreset": "BULLET_DISC_CIRCLE_SQUARE"
            }
        }));
    }
    requests
}

#[async_trait]
impl SlidesBackend for GoogleSlides {
    async fn create_presentation(&self, credential: &Credential, company_name: &str) -> Result<String> {
        let url = format!("{}/v1/presentations", self.base_url);
        let raw = self
            .post(credential, url, &json!({ "title": deck_title(company_name) }))
            .await?;
        let created: CreatedPresentation = serde_json::from_value(raw)?;
        debug!(presentation_id = %created.presentation_id, "created presentation");

        // The default first slide carries a title and a subtitle placeholder.
        let placeholders: Vec<&str> = created
            .slides
            .first()
            .map(|page| page.page_elements.iter().map(|e| e.object_id.as_str()).collect())
            .unwrap_or_default();
        let [title_id, subtitle_id, ..] = placeholders.as_slice() else {
            warn!(presentation_id = %created.presentation_id, "title slide has no placeholders");
            return Err(BridgeError::ToolExecution {
                tool_name: "create-presentation".into(),
                message: "No text placeholders found on the title slide".into(),
            });
        };

        let title = SlideSpec::title_slide(company_name);
        self.batch_update(
            credential,
            &created.presentation_id,
            vec![insert_text(title_id, &title.title), insert_text(subtitle_id, &title.content)],
        )
        .await?;
        Ok(created.presentation_id)
    }

    async fn add_slide(&self, credential: &Credential, presentation_id: &str, slide: &SlideSpec) -> Result<()> {
        self.batch_update(credential, presentation_id, custom_slide_requests(slide))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bullet_slides_request_bullets_and_paragraphs_do_not() {
        let bullet = custom_slide_requests(&SlideSpec::new("Q1", "a\nb", SlideType::Bullet));
        assert_eq!(bullet.len(), 4);
        assert!(bullet[3].get("createParagraphBullets").is_some());

        let paragraph = custom_slide_requests(&SlideSpec::new("Q1", "text", SlideType::Paragraph));
        assert_eq!(paragraph.len(), 3);
    }

    #[test]
    fn generated_object_ids_fit_the_api_limits() {
        let id = object_id("title");
        assert!(id.len() >= 5 && id.len() <= 50);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    }
}
