//! The presentation toolset exposed by the tool server.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator, VariantNames};
use tracing::info;

use super::backend::{SlideSpec, SlideType, SlidesBackend};
use super::extract::find_row;
use crate::error::{BridgeError, Result};
use crate::session::{Credential, SessionContext};
use crate::tools::{
    AgentToolParameters, ContentBlock, Tool, ToolArguments, ToolExecutionContext, ToolRegistry,
};

/// Every tool this server offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum SlidesTool {
    ExtractData,
    CreatePresentation,
    AddCustomSlide,
    SetAccessToken,
}

impl SlidesTool {
    pub fn description(self) -> &'static str {
        match self {
            Self::ExtractData => {
                "Look up one company in CSV text. Matches the first column against \
                 `name` ignoring case and returns that row as a JSON object keyed by \
                 the CSV headers."
            }
            Self::CreatePresentation => {
                "Create a new slide deck titled '<companyName> Slide Deck' with a title \
                 slide, and return its presentation ID. Requires a stored access token."
            }
            Self::AddCustomSlide => {
                "Append a slide to a presentation. slideType is 'Paragraph' for prose \
                 or 'Bullet' for one bullet per line of slideContent. Use the \
                 presentation ID returned by create-presentation."
            }
            Self::SetAccessToken => {
                "Store the user's OAuth access token for later presentation calls."
            }
        }
    }

    pub fn parameters(self) -> AgentToolParameters {
        let builder = AgentToolParameters::object();
        match self {
            Self::ExtractData => builder
                .string("name", "Company name to look up", true)
                .string("csvFile", "Full CSV text, header row first", true),
            Self::CreatePresentation => {
                builder.string("companyName", "Company the deck is about", true)
            }
            Self::AddCustomSlide => builder
                .string("slideTitle", "Slide title", true)
                .string("slideContent", "Slide body text", true)
                .string("presentationId", "Target presentation ID", true)
                .string_enum("slideType", "Body layout", SlideType::VARIANTS, true),
            Self::SetAccessToken => {
                builder.non_empty_string("accessToken", "OAuth access token")
            }
        }
        .build()
    }

    /// Instantiate this tool over a backend.
    pub fn build(self, backend: Arc<dyn SlidesBackend>) -> Arc<dyn Tool> {
        Arc::new(SlidesToolHandler {
            kind: self,
            parameters: self.parameters(),
            backend,
        })
    }
}

/// A registry holding all four presentation tools.
pub fn slides_registry(backend: Arc<dyn SlidesBackend>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for kind in SlidesTool::iter() {
        registry.register(kind.build(Arc::clone(&backend)));
    }
    registry
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractDataArgs {
    name: String,
    csv_file: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePresentationArgs {
    company_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddCustomSlideArgs {
    slide_title: String,
    slide_content: String,
    presentation_id: String,
    slide_type: SlideType,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetAccessTokenArgs {
    access_token: String,
}

struct SlidesToolHandler {
    kind: SlidesTool,
    parameters: AgentToolParameters,
    backend: Arc<dyn SlidesBackend>,
}

#[async_trait]
impl Tool for SlidesToolHandler {
    fn name(&self) -> &str {
        self.kind.as_ref()
    }

    fn description(&self) -> &str {
        self.kind.description()
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext,
    ) -> Result<Vec<ContentBlock>> {
        let reply = match self.kind {
            SlidesTool::ExtractData => extract_data(args.deserialize()?)?,
            SlidesTool::CreatePresentation => {
                self.create_presentation(&ctx.session, args.deserialize()?)
                    .await?
            }
            SlidesTool::AddCustomSlide => {
                self.add_custom_slide(&ctx.session, args.deserialize()?)
                    .await?
            }
            SlidesTool::SetAccessToken => set_access_token(&ctx.session, args.deserialize()?)?,
        };
        Ok(vec![ContentBlock::text(reply)])
    }
}

impl SlidesToolHandler {
    async fn create_presentation(
        &self,
        session: &SessionContext,
        args: CreatePresentationArgs,
    ) -> Result<String> {
        let credential = require_credential(session)?;
        let company = args.company_name.trim();
        if company.is_empty() {
            return Err(BridgeError::InvalidArgument("companyName must not be empty".into()));
        }

        let id = self
            .backend
            .create_presentation(&credential, company)
            .await
            .map_err(|e| self.execution_error(e))?;
        session.set_current_artifact_id(&id);
        info!(presentation_id = %id, company, "created presentation");
        Ok(format!("Presentation ID: {id}. Check your root Google Drive folder!"))
    }

    async fn add_custom_slide(
        &self,
        session: &SessionContext,
        args: AddCustomSlideArgs,
    ) -> Result<String> {
        let credential = require_credential(session)?;
        let presentation_id = match args.presentation_id.trim() {
            "" => session.current_artifact_id().ok_or_else(|| {
                BridgeError::State("No presentation ID given and none created yet".into())
            })?,
            id => id.to_string(),
        };

        let slide = SlideSpec::new(args.slide_title, args.slide_content, args.slide_type);
        self.backend
            .add_slide(&credential, &presentation_id, &slide)
            .await
            .map_err(|e| self.execution_error(e))?;
        info!(%presentation_id, slide_type = %slide.slide_type, "added slide");
        Ok("Successfully created a new custom slide. Check your root Google Drive folder!".into())
    }

    fn execution_error(&self, error: BridgeError) -> BridgeError {
        BridgeError::ToolExecution {
            tool_name: self.kind.to_string(),
            message: error.to_string(),
        }
    }
}

fn extract_data(args: ExtractDataArgs) -> Result<String> {
    let row = find_row(&args.csv_file, &args.name).ok_or_else(|| {
        BridgeError::InvalidArgument(format!(
            "Could not find a title with the name {}. Is it spelled correctly?",
            args.name
        ))
    })?;
    Ok(serde_json::to_string(&row)?)
}

fn set_access_token(session: &SessionContext, args: SetAccessTokenArgs) -> Result<String> {
    let token = args.access_token.trim();
    if token.is_empty() {
        return Err(BridgeError::InvalidArgument(
            "Access token is empty. Pass in a valid access token".into(),
        ));
    }
    session.set_credential(Credential::new(token));
    info!("stored access token");
    Ok("Successfully stored the user's access token".into())
}

fn require_credential(session: &SessionContext) -> Result<Credential> {
    session.credential().ok_or_else(|| {
        BridgeError::State("No access token stored. Call set-access-token first".into())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slides::MemorySlides;
    use crate::tools::{ToolInvocationRequest, ToolInvocationResult};
    use serde_json::json;

    fn registry() -> (ToolRegistry, Arc<MemorySlides>) {
        let backend = Arc::new(MemorySlides::new());
        (slides_registry(backend.clone()), backend)
    }

    async fn call(registry: &ToolRegistry, ctx: &ToolExecutionContext, name: &str, args: serde_json::Value) -> ToolInvocationResult {
        registry
            .invoke(&ToolInvocationRequest::new(name, args), ctx)
            .await
    }

    #[test]
    fn names_are_kebab_case_in_registration_order() {
        let (registry, _) = registry();
        let names: Vec<_> = registry.list_tools().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["extract-data", "create-presentation", "add-custom-slide", "set-access-token"]
        );
    }

    #[tokio::test]
    async fn extract_data_reports_missing_rows_in_band() {
        let (registry, _) = registry();
        let ctx = ToolExecutionContext::default();
        let result = call(
            &registry,
            &ctx,
            "extract-data",
            json!({"name": "Initech", "csvFile": "Name,ARR\nAcme,100"}),
        )
        .await;
        assert_eq!(
            result,
            ToolInvocationResult::failure(
                "Could not find a title with the name Initech. Is it spelled correctly?"
            )
        );
    }

    #[tokio::test]
    async fn create_presentation_requires_a_credential() {
        let (registry, backend) = registry();
        let ctx = ToolExecutionContext::default();
        let result = call(&registry, &ctx, "create-presentation", json!({"companyName": "Acme"})).await;
        assert!(!result.is_success());
        assert!(backend.is_empty());
        assert!(ctx.session.current_artifact_id().is_none());
    }

    #[tokio::test]
    async fn whitespace_token_is_rejected_and_not_stored() {
        let (registry, _) = registry();
        let ctx = ToolExecutionContext::default();
        let result = call(&registry, &ctx, "set-access-token", json!({"accessToken": "   "})).await;
        assert!(!result.is_success());
        assert!(!ctx.session.has_credential());
    }

    #[tokio::test]
    async fn add_custom_slide_falls_back_to_current_presentation() {
        let (registry, backend) = registry();
        let ctx = ToolExecutionContext::default();
        call(&registry, &ctx, "set-access-token", json!({"accessToken": "tok"})).await;
        let created = call(&registry, &ctx, "create-presentation", json!({"companyName": "Acme"})).await;
        assert!(created.is_success());
        let id = ctx.session.current_artifact_id().unwrap();

        let added = call(
            &registry,
            &ctx,
            "add-custom-slide",
            json!({
                "slideTitle": "Highlights",
                "slideContent": "Grew ARR\nHired",
                "presentationId": "",
                "slideType": "Bullet"
            }),
        )
        .await;
        assert!(added.is_success(), "{}", added.text());
        let deck = backend.presentation(&id).unwrap();
        assert_eq!(deck.slides.len(), 2);
        assert_eq!(deck.slides[1].slide_type, SlideType::Bullet);
    }
}
