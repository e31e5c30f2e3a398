//! Presentation backends.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, VariantNames};
use tracing::debug;
use uuid::Uuid;

use crate::error::{BridgeError, Result};
use crate::session::Credential;

/// Layout of a custom slide.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr, VariantNames,
)]
pub enum SlideType {
    /// Title over a plain text body.
    Paragraph,
    /// Title over a bulleted body, one bullet per line.
    Bullet,
}

/// Content of one slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideSpec {
    pub title: String,
    pub content: String,
    pub slide_type: SlideType,
}

impl SlideSpec {
    pub fn new(title: impl Into<String>, content: impl Into<String>, slide_type: SlideType) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            slide_type,
        }
    }

    /// Title slide for a new deck: the company name and today's date.
    pub fn title_slide(company_name: &str) -> Self {
        Self::new(
            company_name,
            format!("Created: {}", Utc::now().format("%Y-%m-%d")),
            SlideType::Paragraph,
        )
    }
}

/// Title given to a deck created for a company.
pub fn deck_title(company_name: &str) -> String {
    format!("{company_name} Slide Deck")
}

/// Storage for presentations.
#[async_trait]
pub trait SlidesBackend: Send + Sync {
    /// Create a deck with a title slide and return its identifier.
    async fn create_presentation(&self, credential: &Credential, company_name: &str) -> Result<String>;

    /// Append a slide to an existing deck.
    async fn add_slide(&self, credential: &Credential, presentation_id: &str, slide: &SlideSpec) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryPresentation {
    pub title: String,
    pub slides: Vec<SlideSpec>,
}

/// In-process backend. Useful offline and in tests.
#[derive(Debug, Default)]
pub struct MemorySlides {
    presentations: Mutex<HashMap<String, MemoryPresentation>>,
}

impl MemorySlides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one presentation.
    pub fn presentation(&self, id: &str) -> Option<MemoryPresentation> {
        self.lock().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemoryPresentation>> {
        self.presentations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SlidesBackend for MemorySlides {
    async fn create_presentation(&self, _credential: &Credential, company_name: &str) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string();
        let presentation = MemoryPresentation {
            title: deck_title(company_name),
            slides: vec![SlideSpec::title_slide(company_name)],
        };
        debug!(presentation_id = %id, title = %presentation.title, "created in-memory presentation");
        self.lock().insert(id.clone(), presentation);
        Ok(id)
    }

    async fn add_slide(&self, _credential: &Credential, presentation_id: &str, slide: &SlideSpec) -> Result<()> {
        let mut presentations = self.lock();
        let presentation = presentations.get_mut(presentation_id).ok_or_else(|| {
            BridgeError::InvalidArgument(format!("Unknown presentation '{presentation_id}'"))
        })?;
        presentation.slides.push(slide.clone());
        Ok(())
    }
}
