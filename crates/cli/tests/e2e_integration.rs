//! End-to-end tests for Snello.
//!
//! These drive `ChatService` with the real to-do tools, an in-memory SQLite
//! item store and an on-disk session store. Only the model is scripted.

use std::sync::{Arc, Mutex};

use snello_agent::{AgentLoop, ChatService, MAX_ROUNDS_REPLY, QUOTA_REPLY, display_messages};
use snello_core::error::{Error, ProviderError, StoreError};
use snello_core::message::{Message, ToolInvocationRequest};
use snello_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use snello_core::store::{ItemStore, SessionStore};
use snello_providers::ProviderTitleGenerator;
use snello_store::{FileSessionStore, SqliteItemStore};
use snello_tools::list_items::EMPTY_LIST;
use snello_tools::todo_registry;

// ── Mock Provider ────────────────────────────────────────────────────────

/// Returns scripted replies in sequence and records every request.
struct ScriptedProvider {
    responses: Mutex<Vec<Result<Message, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Result<Message, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, n: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[n].clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let model = request.model.clone();
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            panic!("ScriptedProvider exhausted at call #{n}");
        }
        responses.remove(0).map(|message| ProviderResponse {
            message,
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model,
        })
    }
}

fn call(tool: &str, args: serde_json::Value) -> ToolInvocationRequest {
    ToolInvocationRequest::new(tool, args)
}

fn wants(calls: Vec<ToolInvocationRequest>) -> Result<Message, ProviderError> {
    Ok(Message::ai_with_tool_calls("", calls))
}

fn says(text: &str) -> Result<Message, ProviderError> {
    Ok(Message::ai(text))
}

// ── Harness ──────────────────────────────────────────────────────────────

struct Harness {
    service: ChatService,
    model: Arc<ScriptedProvider>,
    items: Arc<SqliteItemStore>,
    sessions: Arc<FileSessionStore>,
    dir: tempfile::TempDir,
}

async fn harness(script: Vec<Result<Message, ProviderError>>) -> Harness {
    harness_with_rounds(script, 25).await
}

async fn harness_with_rounds(script: Vec<Result<Message, ProviderError>>, rounds: u32) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedProvider::new(script));
    let items = Arc::new(SqliteItemStore::new(":memory:").await.unwrap());
    let sessions = Arc::new(FileSessionStore::new(dir.path().join("chat_sessions")));

    let titler = Arc::new(ScriptedProvider::new(vec![says("\"Weekend Errands\"")]));
    let tools = Arc::new(todo_registry(items.clone()));
    let agent = Arc::new(
        AgentLoop::new(model.clone(), "e2e-model", 0.7, tools).with_max_tool_rounds(rounds),
    );

    let service = ChatService::new(
        agent,
        sessions.clone(),
        items.clone(),
        Arc::new(ProviderTitleGenerator::new(titler, "e2e-model")),
    );

    Harness {
        service,
        model,
        items,
        sessions,
        dir,
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_then_list_across_turns() {
    let h = harness(vec![
        wants(vec![call("add_item", serde_json::json!({"text": "buy milk"}))]),
        says("Added 'buy milk' to your list."),
        wants(vec![call("list_items", serde_json::json!({}))]),
        says("You have one item: 1. buy milk"),
    ])
    .await;

    let mut chat = h.service.start();
    let first = h.service.send(&mut chat, "add buy milk").await.unwrap();
    assert!(!first.degraded);
    assert_eq!(first.reply, "Added 'buy milk' to your list.");

    let second = h.service.send(&mut chat, "what's on my list?").await.unwrap();
    assert_eq!(second.session_id, first.session_id);

    // The list tool's output reached the model on the fourth call.
    let last = h.model.request(3);
    let tool_output = last
        .messages
        .iter()
        .rev()
        .find(|m| m.is_tool_result())
        .map(|m| m.content().to_string())
        .unwrap();
    assert_eq!(tool_output, "Here is your current to-do list:\n1. buy milk");

    let items = h.items.list_items().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].text, "buy milk");
}

#[tokio::test]
async fn removing_unknown_id_reports_failure_to_model() {
    let h = harness(vec![
        wants(vec![call("remove_item", serde_json::json!({"item_id": 999}))]),
        says("I couldn't find item 999."),
    ])
    .await;
    h.items.add_item("call dentist").await.unwrap();

    let mut chat = h.service.start();
    let turn = h.service.send(&mut chat, "remove item 999").await.unwrap();
    assert_eq!(turn.reply, "I couldn't find item 999.");

    let Message::Tool(result) = chat.messages.iter().find(|m| m.is_tool_result()).unwrap() else {
        unreachable!()
    };
    assert!(!result.success);
    assert_eq!(
        result.content,
        "Error: No to-do item found with ID 999. Please check the ID and try again."
    );
    assert_eq!(h.items.list_items().await.unwrap().len(), 1);
}

#[tokio::test]
async fn several_tool_calls_run_in_order_before_next_model_call() {
    let h = harness(vec![
        wants(vec![
            call("add_item", serde_json::json!({"text": "a"})),
            call("add_item", serde_json::json!({"text": "b"})),
            call("remove_item", serde_json::json!({"item_id": 1})),
        ]),
        says("Done."),
    ])
    .await;

    let mut chat = h.service.start();
    h.service.send(&mut chat, "add a and b, then drop a").await.unwrap();
    assert_eq!(h.model.calls(), 2);

    let request = h.model.request(1);
    let results: Vec<&str> = request
        .messages
        .iter()
        .filter(|m| m.is_tool_result())
        .map(|m| m.content())
        .collect();
    assert_eq!(
        results,
        vec![
            "Successfully added 'a' to the to-do list.",
            "Successfully added 'b' to the to-do list.",
            "Successfully removed to-do item with ID 1.",
        ]
    );

    let items = h.items.list_items().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!((items[0].id, items[0].text.as_str()), (2, "b"));
}

#[tokio::test]
async fn session_is_titled_saved_and_resumable() {
    let h = harness(vec![
        says("Hi! What should I add?"),
        wants(vec![call("add_item", serde_json::json!({"text": "buy milk"}))]),
        says("Added it."),
    ])
    .await;

    let mut chat = h.service.start();
    let turn = h.service.send(&mut chat, "hello snello").await.unwrap();

    let sessions = h.service.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id, turn.session_id);
    assert_eq!(sessions[0].title, "Weekend Errands");

    let mut resumed = h.service.resume(&turn.session_id).await.unwrap();
    let shown: Vec<&str> = display_messages(&resumed.messages).map(|m| m.content()).collect();
    assert_eq!(shown, vec!["hello snello", "Hi! What should I add?"]);

    let next = h.service.send(&mut resumed, "add buy milk").await.unwrap();
    assert_eq!(next.session_id, turn.session_id);

    // Title is fixed at creation; the transcript grew.
    let sessions = h.service.list_sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].title, "Weekend Errands");
    let saved = h.sessions.load_session(&turn.session_id).await.unwrap();
    assert!(saved.first().unwrap().is_system());
    assert_eq!(display_messages(&saved).count(), 4);
}

#[tokio::test]
async fn quota_exhaustion_is_saved_as_apology() {
    let h = harness(vec![Err(ProviderError::RateLimited {
        retry_after_secs: 60,
    })])
    .await;

    let mut chat = h.service.start();
    let turn = h.service.send(&mut chat, "add buy milk").await.unwrap();
    assert!(turn.degraded);
    assert_eq!(turn.reply, QUOTA_REPLY);

    let saved = h.sessions.load_session(&turn.session_id).await.unwrap();
    assert_eq!(saved.last().unwrap().content(), QUOTA_REPLY);
    assert!(h.items.list_items().await.unwrap().is_empty());
}

#[tokio::test]
async fn runaway_tool_use_is_capped() {
    let h = harness_with_rounds(
        vec![
            wants(vec![call("list_items", serde_json::json!({}))]),
            wants(vec![call("list_items", serde_json::json!({}))]),
            wants(vec![call("list_items", serde_json::json!({}))]),
        ],
        2,
    )
    .await;

    let mut chat = h.service.start();
    let turn = h.service.send(&mut chat, "list forever").await.unwrap();
    assert_eq!(turn.reply, MAX_ROUNDS_REPLY);
    assert_eq!(h.model.calls(), 3);

    let listed: Vec<&str> = chat
        .messages
        .iter()
        .filter(|m| m.is_tool_result())
        .map(|m| m.content())
        .collect();
    assert_eq!(listed, vec![EMPTY_LIST, EMPTY_LIST]);
}

#[tokio::test]
async fn clearing_items_keeps_ids_fresh() {
    let h = harness(vec![
        wants(vec![call("add_item", serde_json::json!({"text": "walk dog"}))]),
        says("Added."),
    ])
    .await;
    h.items.add_item("old one").await.unwrap();
    h.items.add_item("old two").await.unwrap();

    h.service.clear_items().await.unwrap();
    assert!(h.service.list_items().await.unwrap().is_empty());

    let mut chat = h.service.start();
    h.service.send(&mut chat, "add walk dog").await.unwrap();
    let items = h.service.list_items().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, 3);
}

#[tokio::test]
async fn deleted_session_cannot_be_resumed() {
    let h = harness(vec![says("Hello!")]).await;

    let mut chat = h.service.new_chat();
    let turn = h.service.send(&mut chat, "hi").await.unwrap();
    h.service.delete_session(&turn.session_id).await.unwrap();

    assert!(h.service.list_sessions().await.unwrap().is_empty());
    let err = h.service.resume(&turn.session_id).await.unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::SessionNotFound(_))));
}

#[tokio::test]
async fn imported_transcript_becomes_a_session() {
    let h = harness(vec![says("Still here.")]).await;

    let transcript = serde_json::json!([
        {"type": "system", "content": "You are a helpful AI assistant named Snello."},
        {"type": "human", "content": "add buy milk"},
        {"type": "ai", "content": "Added 'buy milk'."}
    ]);
    let path = h.dir.path().join("legacy.json");
    std::fs::write(&path, transcript.to_string()).unwrap();

    let id = h.service.import_transcript(&path).await.unwrap();
    let mut chat = h.service.resume(&id).await.unwrap();
    assert_eq!(display_messages(&chat.messages).count(), 2);

    let turn = h.service.send(&mut chat, "anything else?").await.unwrap();
    assert_eq!(turn.session_id, id);
    // The model saw the imported history.
    assert!(
        h.model
            .request(0)
            .messages
            .iter()
            .any(|m| m.content() == "Added 'buy milk'.")
    );
}
