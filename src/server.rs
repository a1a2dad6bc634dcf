//! The HTTP surface: a single chat endpoint the extension sidebar talks to.
//!
//! Every failure is recovered here and answered as a normal JSON reply; a
//! request either gets `{"reply", "context_full"}` or `{"actions": [...]}`,
//! never a 5xx.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::content::{ContentBlock, simplified_context};
use crate::dispatch::{Action, Dispatch, dispatch};
use crate::gemini::{DEFAULT_MODEL, GeminiClient, ModelError};
use crate::tools::declarations_for;

const NO_ACTION_REPLY: &str = "The AI analyzed the context but decided no action was necessary.";
const MALFORMED_REPLY: &str = "An error occurred while processing the AI's response.";

pub struct AppState {
    pub model: GeminiClient,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub parsed_content: Vec<ContentBlock>,
    #[serde(default)]
    pub enabled_mcp_tools: Vec<String>,
    #[serde(default = "default_intent")]
    pub intent: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_intent() -> String {
    "act".to_string()
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ChatResponse {
    Reply {
        reply: String,
        context_full: Option<Vec<ContentBlock>>,
    },
    Actions {
        actions: Vec<Action>,
    },
}

impl ChatResponse {
    fn reply(text: impl Into<String>, context: Option<Vec<ContentBlock>>) -> Self {
        Self::Reply {
            reply: text.into(),
            context_full: context,
        }
    }
}

fn answer_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful assistant. Answer the user's question based *only* on the provided context.\n\
         Do not use any tools. Be concise and directly answer the question.\n\
         CONTEXT:\n\
         ---\n\
         {context}\n\
         ---\n\
         USER QUESTION: {question}"
    )
}

fn act_prompt(context: &str, command: &str) -> String {
    format!(
        "You are a web-browsing assistant. Use the provided tools to act on the page context based on the user's command.\n\
         \n\
         CONTEXT FROM CURRENT WEBPAGE:\n\
         ---\n\
         {context}\n\
         ---\n\
         USER COMMAND: {command}"
    )
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        // The extension sidebar calls this server cross-origin.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let context = simplified_context(&request.parsed_content);
    info!(
        intent = %request.intent,
        model = %request.model,
        blocks = request.parsed_content.len(),
        "chat request"
    );
    debug!(%context, "context for the model");

    let response = match request.intent.as_str() {
        "answer" => answer(&state, &request, &context).await,
        "act" => act(&state, &request, &context).await,
        other => ChatResponse::reply(format!("Error: Unknown intent '{other}'"), None),
    };
    Json(response)
}

/// Informational queries: no tools are declared, so the reply can only be
/// text (or an error).
async fn answer(state: &AppState, request: &ChatRequest, context: &str) -> ChatResponse {
    let prompt = answer_prompt(context, &request.prompt);
    match state.model.generate(&request.model, &prompt, Vec::new()).await {
        Ok(reply) => match reply.text() {
            Some(text) => ChatResponse::reply(text, Some(request.parsed_content.clone())),
            None => {
                warn!("answer-mode reply carried no text");
                ChatResponse::reply(MALFORMED_REPLY, None)
            }
        },
        Err(err) => {
            warn!("model call failed: {err}");
            ChatResponse::reply(upstream_error(&err), Some(request.parsed_content.clone()))
        }
    }
}

/// Action requests: declare the enabled tools and map whatever comes back
/// through the dispatcher.
async fn act(state: &AppState, request: &ChatRequest, context: &str) -> ChatResponse {
    let prompt = act_prompt(context, &request.prompt);
    let declarations = declarations_for(&request.enabled_mcp_tools);

    let reply = match state.model.generate(&request.model, &prompt, declarations).await {
        Ok(reply) => reply,
        Err(err) => {
            warn!("model call failed: {err}");
            return ChatResponse::reply(upstream_error(&err), None);
        }
    };

    match dispatch(&reply, &request.parsed_content) {
        Dispatch::Text(text) => ChatResponse::reply(text, Some(request.parsed_content.clone())),
        Dispatch::Actions(actions) => ChatResponse::Actions { actions },
        Dispatch::NoAction => {
            ChatResponse::reply(NO_ACTION_REPLY, Some(request.parsed_content.clone()))
        }
        Dispatch::InvalidTarget { mcp_id } => ChatResponse::reply(
            format!("AI error: Tried to use a tool on an element with an invalid ID ('{mcp_id}')."),
            None,
        ),
        Dispatch::Malformed => ChatResponse::reply(MALFORMED_REPLY, None),
    }
}

fn upstream_error(err: &ModelError) -> String {
    format!(
        "Error: Could not get a response from the AI model. \
         Please check the server logs. Details: {err}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn unconfigured_app() -> Router {
        router(Arc::new(AppState {
            model: GeminiClient::new(None),
        }))
    }

    fn mocked_app(server: &MockServer) -> Router {
        router(Arc::new(AppState {
            model: GeminiClient::with_base_url(Some("test-key".into()), server.uri()),
        }))
    }

    async fn post_chat(app: Router, body: Value) -> Value {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/chat")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn button_block(mcp_id: &str) -> Value {
        json!({
            "simplified": format!("[Demo]({mcp_id})"),
            "detailed": {"attributes": {"mcp_id": mcp_id}, "children": []}
        })
    }

    #[tokio::test]
    async fn unknown_intent_is_rejected_without_a_model_call() {
        let body = post_chat(
            unconfigured_app(),
            json!({"prompt": "do something", "intent": "summarize"}),
        )
        .await;
        assert_eq!(body["reply"], "Error: Unknown intent 'summarize'");
        assert_eq!(body["context_full"], Value::Null);
    }

    #[tokio::test]
    async fn act_without_a_key_reports_the_model_failure() {
        let body = post_chat(unconfigured_app(), json!({"prompt": "click the button"})).await;
        let reply = body["reply"].as_str().unwrap();
        assert!(reply.starts_with("Error: Could not get a response from the AI model."));
        assert!(reply.contains("API key is missing"));
        assert_eq!(body["context_full"], Value::Null);
    }

    #[tokio::test]
    async fn answer_failures_still_echo_the_context() {
        let body = post_chat(
            unconfigured_app(),
            json!({
                "prompt": "what does this page say?",
                "intent": "answer",
                "parsed_content": [button_block("mcp-id-1")]
            }),
        )
        .await;
        assert!(
            body["reply"]
                .as_str()
                .unwrap()
                .starts_with("Error: Could not get a response")
        );
        assert_eq!(body["context_full"][0]["simplified"], "[Demo](mcp-id-1)");
    }

    #[tokio::test]
    async fn answer_returns_model_text_with_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [{
                    "text": "You are a helpful assistant. Answer the user's question based *only* on the provided context.\nDo not use any tools. Be concise and directly answer the question.\nCONTEXT:\n---\n[Demo](mcp-id-1)\n---\nUSER QUESTION: what is on this page?"
                }]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": "A demo button."}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let body = post_chat(
            mocked_app(&server),
            json!({
                "prompt": "what is on this page?",
                "intent": "answer",
                "enabled_mcp_tools": ["press_button"],
                "parsed_content": [button_block("mcp-id-1")]
            }),
        )
        .await;

        assert_eq!(body["reply"], "A demo button.");
        assert_eq!(body["context_full"][0]["simplified"], "[Demo](mcp-id-1)");
        assert!(body.get("actions").is_none());
    }

    #[tokio::test]
    async fn answer_never_returns_actions() {
        // Even a tool-call-shaped reply in answer mode must not dispatch.
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [
                    {"functionCall": {"name": "press_button", "args": {"mcp_id": "mcp-id-1"}}}
                ]}}]
            })))
            .mount(&server)
            .await;

        let body = post_chat(
            mocked_app(&server),
            json!({
                "prompt": "what is on this page?",
                "intent": "answer",
                "parsed_content": [button_block("mcp-id-1")]
            }),
        )
        .await;

        assert!(body.get("actions").is_none());
        assert_eq!(
            body["reply"],
            "An error occurred while processing the AI's response."
        );
        assert_eq!(body["context_full"], Value::Null);
    }

    #[tokio::test]
    async fn act_maps_a_tool_call_to_actions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "toolConfig": {"functionCallingConfig": {"mode": "ANY"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [
                    {"functionCall": {"name": "press_button", "args": {
                        "mcp_id": "mcp-id-3", "reason": "demo"
                    }}}
                ]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let body = post_chat(
            mocked_app(&server),
            json!({
                "prompt": "press the demo button",
                "enabled_mcp_tools": ["press_button"],
                "parsed_content": [button_block("mcp-id-3")]
            }),
        )
        .await;

        assert_eq!(
            body,
            json!({"actions": [{"action": "press_button", "mcp_id": "mcp-id-3", "reason": "demo"}]})
        );
    }

    #[tokio::test]
    async fn act_reports_an_invalid_tool_target() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [
                    {"functionCall": {"name": "press_button", "args": {"mcp_id": "mcp-id-404"}}}
                ]}}]
            })))
            .mount(&server)
            .await;

        let body = post_chat(
            mocked_app(&server),
            json!({
                "prompt": "press the demo button",
                "parsed_content": [button_block("mcp-id-3")]
            }),
        )
        .await;

        assert_eq!(
            body["reply"],
            "AI error: Tried to use a tool on an element with an invalid ID ('mcp-id-404')."
        );
        assert_eq!(body["context_full"], Value::Null);
    }

    #[tokio::test]
    async fn act_with_an_idle_model_returns_the_fixed_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": []}}]
            })))
            .mount(&server)
            .await;

        let body = post_chat(
            mocked_app(&server),
            json!({
                "prompt": "do nothing",
                "parsed_content": [button_block("mcp-id-3")]
            }),
        )
        .await;

        assert_eq!(body["reply"], NO_ACTION_REPLY);
        assert_eq!(body["context_full"][0]["simplified"], "[Demo](mcp-id-3)");
    }

    #[tokio::test]
    async fn act_returns_plain_text_with_context() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"role": "model", "parts": [
                    {"text": "Nothing on this page matches."}
                ]}}]
            })))
            .mount(&server)
            .await;

        let body = post_chat(
            mocked_app(&server),
            json!({"prompt": "press the missing button", "parsed_content": [button_block("mcp-id-3")]}),
        )
        .await;

        assert_eq!(body["reply"], "Nothing on this page matches.");
        assert_eq!(body["context_full"][0]["simplified"], "[Demo](mcp-id-3)");
    }

    #[tokio::test]
    async fn request_fields_default_like_the_wire_protocol() {
        // An empty body is a valid request: act intent, default model, no
        // context, no tools.
        let body = post_chat(unconfigured_app(), json!({})).await;
        assert!(
            body["reply"]
                .as_str()
                .unwrap()
                .starts_with("Error: Could not get a response")
        );
    }
}
