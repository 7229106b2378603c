//! HTTP contract tests driving the router in-process.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use robocomic_core::{
    AudioPayload, ComedyService, ComicError, CompletionRequest, Language, LlmBackend, PersonaRegistry, Settings,
    SpeechBackend,
};
use robocomic_server::{AppState, app};
use serde_json::{Value, json};
use tower::ServiceExt;

struct FakeLlm {
    reply: Option<String>,
    calls: AtomicUsize,
}

impl FakeLlm {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    fn down() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmBackend for FakeLlm {
    async fn complete(&self, _request: CompletionRequest) -> Result<String, ComicError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(reply) => Ok(format!("{reply} #{n}")),
            None => Err(ComicError::UpstreamStatus {
                service: "openai",
                status: 503,
                body: "overloaded".to_string(),
            }),
        }
    }

    fn model(&self) -> &str {
        "fake-model"
    }
}

#[derive(Clone, Copy)]
enum SpeechMode {
    Samples,
    Encoded,
    NoCredits,
    Broken,
}

struct FakeSpeech {
    mode: SpeechMode,
    calls: AtomicUsize,
}

impl FakeSpeech {
    fn new(mode: SpeechMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SpeechBackend for FakeSpeech {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn synthesize(
        &self,
        _text: &str,
        _lang: Language,
        _voice_id: Option<&str>,
    ) -> Result<AudioPayload, ComicError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            SpeechMode::Samples => Ok(AudioPayload::Samples {
                samples: vec![0.0, 0.25, -0.25],
                sample_rate: 24_000,
            }),
            SpeechMode::Encoded => Ok(AudioPayload::Encoded {
                bytes: b"RIFFencoded".to_vec(),
            }),
            SpeechMode::NoCredits => Err(ComicError::TtsCreditsExceeded),
            SpeechMode::Broken => Err(ComicError::UpstreamStatus {
                service: "elevenlabs",
                status: 500,
                body: "boom".to_string(),
            }),
        }
    }
}

fn settings() -> Settings {
    Settings::from_lookup(|key| {
        let value = match key {
            "OPENAI_API_KEY" => "sk-test",
            "ELEVENLABS_API_KEY" => "xi-test",
            "COMEDIAN1_VOICE_ID" => "voice-one",
            "COMEDIAN2_VOICE_ID" => "voice-two",
            "LLM_MODEL" => "gpt-test",
            _ => return None,
        };
        Some(value.to_string())
    })
    .unwrap()
}

fn test_app(llm: Arc<dyn LlmBackend>, speech: Arc<dyn SpeechBackend>) -> Router {
    let service = ComedyService::new(
        Arc::new(settings()),
        Arc::new(PersonaRegistry::builtin().unwrap()),
        llm,
        speech,
    );
    app(AppState::new(service))
}

fn default_app() -> Router {
    test_app(FakeLlm::replying("Joke"), FakeSpeech::new(SpeechMode::Samples))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, HeaderMap, Bytes) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes)
}

async fn send_json(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, bytes) = send(app, method, uri, body).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn airplanes_show() -> Value {
    json!({
        "comedian1_style": "sarcastic",
        "comedian2_style": "absurd",
        "mode": "topical",
        "topic": "airplanes",
        "num_rounds": 1
    })
}

#[tokio::test]
async fn health_reports_status_and_timing() {
    let app = default_app();
    let (status, headers, bytes) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].as_str().unwrap().contains('T'));

    let elapsed: f64 = headers["x-process-time"].to_str().unwrap().parse().unwrap();
    assert!(elapsed >= 0.0);
}

#[tokio::test]
async fn personas_are_listed_identically_every_time() {
    let app = default_app();
    let (status, first) = send_json(&app, Method::GET, "/personas", None).await;
    let (_, second) = send_json(&app, Method::GET, "/personas", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(first, second);
    let personas = first["personas"].as_object().unwrap();
    assert_eq!(personas.len(), 12);
    assert_eq!(personas["sarcastic"]["name"], "Sarcastic Sam");
    assert_eq!(personas["absurd"]["style"], "absurd");
}

#[tokio::test]
async fn generate_show_alternates_comedians() {
    let llm = FakeLlm::replying("Joke");
    let app = test_app(llm.clone(), FakeSpeech::new(SpeechMode::Samples));

    let (status, body) = send_json(&app, Method::POST, "/generate-show", Some(airplanes_show())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let history = body["history"].as_array().unwrap();
    assert!(!history.is_empty() && history.len() <= 4);
    for (i, entry) in history.iter().enumerate() {
        let expected = if i % 2 == 0 { "Comedian_1" } else { "Comedian_2" };
        assert_eq!(entry["role"], expected);
        assert!(!entry["content"].as_str().unwrap().is_empty());
    }
    assert_eq!(llm.calls(), 4);
}

#[tokio::test]
async fn generate_show_with_context_makes_one_extra_call() {
    let llm = FakeLlm::replying("Fact. Joke");
    let app = test_app(llm.clone(), FakeSpeech::new(SpeechMode::Samples));
    let mut request = airplanes_show();
    request["build_context"] = json!(true);

    let (status, body) = send_json(&app, Method::POST, "/generate-show", Some(request)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(llm.calls(), 5);
}

#[tokio::test]
async fn unknown_persona_is_rejected_before_any_model_call() {
    let llm = FakeLlm::replying("Joke");
    let app = test_app(llm.clone(), FakeSpeech::new(SpeechMode::Samples));
    let mut request = airplanes_show();
    request["comedian1_style"] = json!("mime");

    let (status, body) = send_json(&app, Method::POST, "/generate-show", Some(request)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
    assert_eq!(body["details"][0]["loc"], json!(["body", "comedian1_style"]));
    assert_eq!(body["details"][0]["input"], "mime");
    assert_eq!(llm.calls(), 0);
}

#[tokio::test]
async fn round_count_out_of_range_is_rejected() {
    for rounds in [0, 11] {
        let app = default_app();
        let mut request = airplanes_show();
        request["num_rounds"] = json!(rounds);

        let (status, body) = send_json(&app, Method::POST, "/generate-show", Some(request)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "rounds = {rounds}");
        assert_eq!(body["details"][0]["loc"][1], "num_rounds");
    }
}

#[tokio::test]
async fn model_outage_degrades_to_fallback_transcript() {
    let llm = FakeLlm::down();
    let app = test_app(llm.clone(), FakeSpeech::new(SpeechMode::Samples));

    let (status, body) = send_json(&app, Method::POST, "/generate-show", Some(airplanes_show())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    let roles: Vec<&str> = body["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, ["system", "Comedian_1", "Comedian_2"]);
    assert_eq!(llm.calls(), 1);
}

#[tokio::test]
async fn show_generation_is_rate_limited() {
    let app = default_app();

    for _ in 0..2 {
        let (status, _) = send_json(&app, Method::POST, "/generate-show", Some(airplanes_show())).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, headers, bytes) = send(&app, Method::POST, "/generate-show", Some(airplanes_show())).await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error_code"], "RATE_LIMIT_EXCEEDED");
    assert!(headers.contains_key(header::RETRY_AFTER));
    assert!(headers.contains_key("x-process-time"));

    let (status, _) = send_json(&app, Method::GET, "/personas", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn rejected_show_requests_do_not_use_the_quota() {
    let app = default_app();
    let mut invalid = airplanes_show();
    invalid["comedian1_style"] = json!("mime");

    for _ in 0..2 {
        let (status, _) = send_json(&app, Method::POST, "/generate-show", Some(invalid.clone())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
    let (status, body) = send_json(&app, Method::POST, "/generate-show", Some(airplanes_show())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = default_app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/generate-show")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"comedian1_style\": "))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
    assert_eq!(body["details"][0]["type"], "json_invalid");
}

#[tokio::test]
async fn judge_show_returns_named_winner() {
    let llm = FakeLlm::replying("{\"winner\": \"Absurd Alex\", \"summary\": \"Weirder and funnier.\"}");
    let app = test_app(llm, FakeSpeech::new(SpeechMode::Samples));

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/judge-show",
        Some(json!({
            "comedian1_name": "Sarcastic Sam",
            "comedian2_name": "Absurd Alex",
            "history": [
                {"role": "Comedian_1", "content": "Airlines charge for air now."},
                {"role": "Comedian_2", "content": "My suitcase became a pilot."}
            ],
            "lang": "en"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["winner"], "Absurd Alex");
}

#[tokio::test]
async fn judge_show_defaults_when_model_is_down() {
    let app = test_app(FakeLlm::down(), FakeSpeech::new(SpeechMode::Samples));

    let (status, body) = send_json(
        &app,
        Method::POST,
        "/judge-show",
        Some(json!({
            "comedian1_name": "Sarcastic Sam",
            "comedian2_name": "Absurd Alex",
            "history": [{"role": "Comedian_1", "content": "Hi."}]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["winner"], "Sarcastic Sam");
    assert_eq!(body["summary"], "Sarcastic Sam wins by default (judging failed).");
}

#[tokio::test]
async fn tts_encodes_samples_as_wav() {
    let app = default_app();
    let (status, headers, bytes) = send(
        &app,
        Method::POST,
        "/tts",
        Some(json!({"text": "Why did the plane blush?", "lang": "en"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "audio/wav");
    assert_eq!(&bytes[..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");
}

#[tokio::test]
async fn tts_passes_encoded_audio_through() {
    let app = test_app(FakeLlm::replying("Joke"), FakeSpeech::new(SpeechMode::Encoded));
    let (status, headers, bytes) = send(
        &app,
        Method::POST,
        "/tts",
        Some(json!({"text": "Hello", "voice_id": "voice-two"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "audio/wav");
    assert_eq!(&bytes[..], b"RIFFencoded");
}

#[tokio::test]
async fn tts_credit_exhaustion_is_reported() {
    let app = test_app(FakeLlm::replying("Joke"), FakeSpeech::new(SpeechMode::NoCredits));
    let (status, body) = send_json(&app, Method::POST, "/tts", Some(json!({"text": "Hello"}))).await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error_code"], "TTS_CREDITS_EXCEEDED");
}

#[tokio::test]
async fn tts_backend_failure_is_generation_failure() {
    let app = test_app(FakeLlm::replying("Joke"), FakeSpeech::new(SpeechMode::Broken));
    let (status, body) = send_json(&app, Method::POST, "/tts", Some(json!({"text": "Hello"}))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error_code"], "TTS_GENERATION_FAILED");
}

#[tokio::test]
async fn tts_text_is_validated_before_synthesis() {
    let speech = FakeSpeech::new(SpeechMode::Samples);
    let app = test_app(FakeLlm::replying("Joke"), speech.clone());

    for text in ["   ".to_string(), "a".repeat(1001)] {
        let (status, body) = send_json(&app, Method::POST, "/tts", Some(json!({ "text": text }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"][0]["loc"], json!(["body", "text"]));
    }
    assert_eq!(speech.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tts_rejects_voice_ids_that_are_not_plain_tokens() {
    let speech = FakeSpeech::new(SpeechMode::Samples);
    let app = test_app(FakeLlm::replying("Joke"), speech.clone());
    let request = json!({ "text": "Hello", "voice_id": "../../user/subscription?x=" });

    let (status, body) = send_json(&app, Method::POST, "/tts", Some(request)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["loc"], json!(["body", "voice_id"]));
    assert_eq!(speech.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn configuration_endpoints() {
    let app = default_app();

    let (_, presets) = send_json(&app, Method::GET, "/temperature-presets", None).await;
    let presets = presets.as_array().unwrap();
    assert_eq!(presets.len(), 4);
    assert_eq!(presets[0]["name"], "conservative");
    assert_eq!(presets[3]["temperature"], 1.0);

    let (_, voices) = send_json(&app, Method::GET, "/voice-ids", None).await;
    assert_eq!(voices, json!({"comedian1_voice_id": "voice-one", "comedian2_voice_id": "voice-two"}));

    let (status, config) = send_json(&app, Method::GET, "/llm-config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(config["model"], "fake-model");
    assert_eq!(config["max_tokens"], 1000);
    assert!((config["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
}
