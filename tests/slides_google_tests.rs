//! Google Slides backend against a mock HTTP server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deckbridge::error::BridgeError;
use deckbridge::session::Credential;
use deckbridge::slides::{GoogleSlides, SlideSpec, SlideType, SlidesBackend};

fn token() -> Credential {
    Credential::new("ya29.test")
}

#[tokio::test]
async fn create_presentation_fills_the_title_slide() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/presentations"))
        .and(header("authorization", "Bearer ya29.test"))
        .and(body_partial_json(json!({ "title": "Acme Slide Deck" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "presentationId": "deck-123",
            "slides": [{ "pageElements": [{ "objectId": "title_ph" }, { "objectId": "subtitle_ph" }] }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/presentations/deck-123:batchUpdate"))
        .and(header("authorization", "Bearer ya29.test"))
        .and(body_partial_json(json!({
            "requests": [
                { "insertText": { "objectId": "title_ph", "text": "Acme" } },
                { "insertText": { "objectId": "subtitle_ph" } }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "presentationId": "deck-123" })))
        .expect(1)
        .mount(&server)
        .await;

    let slides = GoogleSlides::with_base_url(server.uri());
    let id = slides.create_presentation(&token(), "Acme").await.unwrap();
    assert_eq!(id, "deck-123");
}

#[tokio::test]
async fn missing_placeholders_fail_the_creation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/presentations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "presentationId": "bare-deck",
            "slides": [{ "pageElements": [] }]
        })))
        .mount(&server)
        .await;

    let err = GoogleSlides::with_base_url(server.uri())
        .create_presentation(&token(), "Acme")
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::ToolExecution { .. }));
}

#[tokio::test]
async fn bullet_slide_sends_a_bullet_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/presentations/deck-9:batchUpdate"))
        .and(body_partial_json(json!({
            "requests": [
                { "createSlide": { "slideLayoutReference": { "predefinedLayout": "TITLE_AND_BODY" } } },
                { "insertText": { "text": "Highlights" } },
                { "insertText": { "text": "Revenue up\nCosts down" } },
                { "createParagraphBullets": { "bulletPreset": "BULLET_DISC_CIRCLE_SQUARE" } }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let slide = SlideSpec::new("Highlights", "Revenue up\nCosts down", SlideType::Bullet);
    GoogleSlides::with_base_url(server.uri())
        .add_slide(&token(), "deck-9", &slide)
        .await
        .unwrap();
}

#[tokio::test]
async fn expired_token_maps_to_authentication_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/presentations"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "code": 401, "message": "Request had invalid authentication credentials." }
        })))
        .mount(&server)
        .await;

    let err = GoogleSlides::with_base_url(server.uri())
        .create_presentation(&token(), "Acme")
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::Authentication(_)));
}
