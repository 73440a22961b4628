mod common;

use actix_web::test;
use serde_json::{json, Value};
use shared::{InputType, OutputType};
use wiremock::matchers::{any, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::TestContext;

#[actix_web::test]
async fn unknown_slug_is_404_before_anything_else() {
    let server = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let ctx = TestContext::new(&server.uri());
    let app = ctx.app().await;

    let req = test::TestRequest::post()
        .uri("/api/predict/no-such-model-12345678")
        .insert_header(("X-API-Key", "mlh_whatever"))
        .set_json(json!({"inputs": [1, 2]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Model not found");
}

#[actix_web::test]
async fn wrong_api_key_is_403_even_with_valid_input() {
    let server = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let ctx = TestContext::new(&server.uri());
    let owner = ctx.seed_user("owner@example.com").await;
    let model = ctx
        .seed_model(owner, "house price", InputType::Numeric, OutputType::Regression)
        .await;
    let app = ctx.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/predict/{}", model.slug))
        .insert_header(("X-API-Key", "mlh_definitely_not_the_key"))
        .set_json(json!({"inputs": [8.32, 41.0]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
    assert_eq!(ctx.usage_count(&model.slug).await, 0);
}

#[actix_web::test]
async fn wrong_api_key_beats_input_validation() {
    let server = MockServer::start().await;
    let ctx = TestContext::new(&server.uri());
    let owner = ctx.seed_user("owner@example.com").await;
    let model = ctx
        .seed_model(owner, "classifier", InputType::Text, OutputType::Classification)
        .await;
    let app = ctx.app().await;

    // Invalid body AND wrong key: the key check must win.
    let req = test::TestRequest::post()
        .uri(&format!("/api/predict/{}", model.slug))
        .insert_header(("X-API-Key", "mlh_wrong"))
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}

#[actix_web::test]
async fn missing_input_is_400_and_never_forwards() {
    let server = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let ctx = TestContext::new(&server.uri());
    let owner = ctx.seed_user("owner@example.com").await;

    let cases = [
        (InputType::Image, OutputType::Classification),
        (InputType::Text, OutputType::Text),
        (InputType::MultiText, OutputType::Classification),
        (InputType::Csv, OutputType::Regression),
        (InputType::Json, OutputType::Json),
        (InputType::Numeric, OutputType::Regression),
    ];

    let app = ctx.app().await;
    for (input_type, output_type) in cases {
        let model = ctx
            .seed_model(owner, input_type.as_str(), input_type, output_type)
            .await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/predict/{}", model.slug))
            .insert_header(("X-API-Key", model.api_key.clone()))
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(
            resp.status(),
            400,
            "empty body should be rejected for {}",
            input_type
        );

        let body: Value = test::read_body_json(resp).await;
        assert!(
            body["error"].as_str().unwrap_or_default().len() > 10,
            "400 should carry a usage hint for {}",
            input_type
        );
        assert_eq!(ctx.usage_count(&model.slug).await, 0);
    }

    // expect(0) on the catch-all mock verifies nothing was forwarded.
    server.verify().await;
}

#[actix_web::test]
async fn downstream_error_maps_to_502_with_details_and_no_count() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"detail": "Prediction failed: bad input shape"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ctx = TestContext::new(&server.uri());
    let owner = ctx.seed_user("owner@example.com").await;
    let model = ctx
        .seed_model(owner, "house price", InputType::Numeric, OutputType::Regression)
        .await;
    let app = ctx.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/predict/{}", model.slug))
        .insert_header(("X-API-Key", model.api_key.clone()))
        .set_json(json!({"inputs": [1.0, 2.0]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 502);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Inference service error");
    assert_eq!(body["details"]["detail"], "Prediction failed: bad input shape");
    assert_eq!(ctx.usage_count(&model.slug).await, 0);
}

#[actix_web::test]
async fn success_merges_model_name_and_counts_exactly_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(body_partial_json(json!({
            "input_type": "numeric",
            "output_type": "regression",
            "inputs": [8.32, 41.0],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "prediction": [[452600.0]],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = TestContext::new(&server.uri());
    let owner = ctx.seed_user("owner@example.com").await;
    let model = ctx
        .seed_model(owner, "house price", InputType::Numeric, OutputType::Regression)
        .await;
    let app = ctx.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/predict/{}", model.slug))
        .insert_header(("X-API-Key", model.api_key.clone()))
        .set_json(json!({"inputs": [8.32, 41.0]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["model"], "house price");
    assert_eq!(body["prediction"], json!([[452600.0]]));
    assert_eq!(ctx.usage_count(&model.slug).await, 1);
}

#[actix_web::test]
async fn multipart_image_is_forwarded_as_base64() {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

    let image_bytes: &[u8] = b"\x89PNG fake image bytes";

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/predict"))
        .and(body_partial_json(json!({
            "input_type": "image",
            "image_base64": BASE64.encode(image_bytes),
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "prediction": [[0.1, 0.9]],
            "predicted_class": 1,
            "confidence": 0.9,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = TestContext::new(&server.uri());
    let owner = ctx.seed_user("owner@example.com").await;
    let model = ctx
        .seed_model(owner, "hand gesture", InputType::Image, OutputType::Classification)
        .await;
    let app = ctx.app().await;

    let (content_type, body) = common::MultipartBuilder::new()
        .file("image", "gesture.png", "image/png", image_bytes)
        .finish();

    let req = test::TestRequest::post()
        .uri(&format!("/api/predict/{}", model.slug))
        .insert_header(("X-API-Key", model.api_key.clone()))
        .insert_header(("Content-Type", content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["model"], "hand gesture");
    assert_eq!(body["predicted_class"], 1);
    assert_eq!(ctx.usage_count(&model.slug).await, 1);
}

#[actix_web::test]
async fn malformed_json_body_is_400() {
    let server = MockServer::start().await;
    Mock::given(any()).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let ctx = TestContext::new(&server.uri());
    let owner = ctx.seed_user("owner@example.com").await;
    let model = ctx
        .seed_model(owner, "parser", InputType::Json, OutputType::Json)
        .await;
    let app = ctx.app().await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/predict/{}", model.slug))
        .insert_header(("X-API-Key", model.api_key.clone()))
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(ctx.usage_count(&model.slug).await, 0);
}
