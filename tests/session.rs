use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use chat_api::{ChatApiClient, ChatApiConfig};
use chat_client::{ChatSession, SessionStatus};
use chat_store::{codec, ChatStore, MemorySlot, Role};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

#[derive(Clone)]
struct ResponseChunk {
    delay_ms: u64,
    bytes: Vec<u8>,
}

#[derive(Clone)]
struct ScriptedResponse {
    status: u16,
    chunks: Vec<ResponseChunk>,
}

struct ScriptedServer {
    base_url: String,
    request_count: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    async fn new(scripts: Vec<ScriptedResponse>) -> Self {
        let scripts = Arc::new(scripts);
        let request_count = Arc::new(AtomicUsize::new(0));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("local TCP listener should bind");
        let addr = listener
            .local_addr()
            .expect("resolved local listener address");
        let base_url = format!("http://{addr}");

        let handle = tokio::spawn({
            let scripts = Arc::clone(&scripts);
            let request_count = Arc::clone(&request_count);

            async move {
                loop {
                    let (socket, _) = match listener.accept().await {
                        Ok(pair) => pair,
                        Err(_) => break,
                    };
                    let scripts = Arc::clone(&scripts);
                    let request_count = Arc::clone(&request_count);
                    tokio::spawn(async move {
                        serve_one(socket, scripts, request_count).await;
                    });
                }
            }
        });

        Self {
            base_url,
            request_count,
            handle,
        }
    }

    fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Acquire)
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

fn token_stream(status: u16, lines: &[&str]) -> ScriptedResponse {
    ScriptedResponse {
        status,
        chunks: vec![ResponseChunk {
            delay_ms: 0,
            bytes: ndjson_lines(lines),
        }],
    }
}

fn ndjson_lines(lines: &[&str]) -> Vec<u8> {
    let mut body = String::new();
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }
    body.into_bytes()
}

fn session_against(server: &ScriptedServer) -> ChatSession<MemorySlot> {
    let client =
        ChatApiClient::new(ChatApiConfig::new(&server.base_url)).expect("client should build");
    ChatSession::new(client, ChatStore::load(MemorySlot::new()))
}

#[tokio::test]
async fn send_streams_tokens_and_persists_the_exchange() {
    let server = ScriptedServer::new(vec![token_stream(
        200,
        &[r#"{"text":"Hi"}"#, r#"{"text":" there"}"#],
    )])
    .await;

    let mut session = session_against(&server);
    let mut echoed = String::new();
    session
        .send("Hello", None, &mut |text| echoed.push_str(text))
        .await;

    assert_eq!(session.status(), SessionStatus::Idle);
    assert!(session.error().is_none());
    assert_eq!(echoed, "Hi there");

    // A conversation was auto-created and the full exchange committed.
    let messages = session.store().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[0].content, "Hello");
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "Hi there");
    assert!(!messages[1].streaming);

    let blob = session
        .store()
        .storage()
        .snapshot()
        .expect("exchange should be persisted");
    let state = codec::deserialize(&blob).expect("blob should decode");
    assert_eq!(state.conversations.len(), 1);
    assert_eq!(state.conversations[0].title, "Hello");
    assert_eq!(state.conversations[0].messages.len(), 2);

    server.shutdown();
}

#[tokio::test]
async fn server_failure_reaches_error_without_a_placeholder() {
    let server = ScriptedServer::new(vec![token_stream(500, &[])]).await;

    let mut session = session_against(&server);
    session.send("Hello", None, &mut |_| {}).await;

    assert_eq!(session.status(), SessionStatus::Error);
    let error = session.error().expect("failure should be recorded");
    assert!(error.contains("Internal Server Error"));

    // Only the user message exists; no assistant placeholder was created.
    let messages = session.store().messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);

    assert_eq!(session.last_prompt(), Some("Hello"));
    server.shutdown();
}

#[tokio::test]
async fn retry_resubmits_the_last_prompt_as_a_fresh_send() {
    let server = ScriptedServer::new(vec![
        token_stream(503, &[]),
        token_stream(200, &[r#"{"text":"recovered"}"#]),
    ])
    .await;

    let mut session = session_against(&server);
    session.send("try me", None, &mut |_| {}).await;
    assert_eq!(session.status(), SessionStatus::Error);

    session.retry(None, &mut |_| {}).await;
    assert_eq!(session.status(), SessionStatus::Idle);
    assert!(session.error().is_none());
    assert_eq!(server.request_count(), 2);

    // The retry goes through the same path as a fresh send, so the prompt is
    // recorded a second time.
    let messages = session.store().messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].content, "try me");
    assert_eq!(messages[1].content, "try me");
    assert_eq!(messages[2].content, "recovered");

    server.shutdown();
}

#[tokio::test]
async fn cancellation_freezes_the_partial_reply_and_returns_to_idle() {
    let server = ScriptedServer::new(vec![ScriptedResponse {
        status: 200,
        chunks: vec![
            ResponseChunk {
                delay_ms: 0,
                bytes: ndjson_lines(&[r#"{"text":"partial"}"#]),
            },
            ResponseChunk {
                delay_ms: 600,
                bytes: ndjson_lines(&[r#"{"text":" rest"}"#]),
            },
        ],
    }])
    .await;

    let mut session = session_against(&server);
    let cancellation = Arc::new(AtomicBool::new(false));

    let mut on_update = |_: &str| {};
    let send = session.send("Hello", Some(&cancellation), &mut on_update);
    let cancel = async {
        sleep(Duration::from_millis(200)).await;
        cancellation.store(true, Ordering::Release);
    };
    tokio::join!(send, cancel);

    assert_eq!(session.status(), SessionStatus::Idle);
    assert!(session.error().is_none());

    let messages = session.store().messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "partial");
    assert!(!messages[1].streaming);

    // The frozen partial reply is durable.
    let blob = session
        .store()
        .storage()
        .snapshot()
        .expect("cancelled turn should persist");
    let state = codec::deserialize(&blob).expect("blob should decode");
    assert_eq!(state.conversations[0].messages[1].content, "partial");

    server.shutdown();
}

#[tokio::test]
async fn empty_prompt_is_a_no_op() {
    let server = ScriptedServer::new(Vec::new()).await;

    let mut session = session_against(&server);
    session.send("   ", None, &mut |_| {}).await;

    assert_eq!(session.status(), SessionStatus::Idle);
    assert!(session.store().conversation_list().is_empty());
    assert_eq!(server.request_count(), 0);

    server.shutdown();
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

async fn serve_one(
    mut socket: TcpStream,
    scripts: Arc<Vec<ScriptedResponse>>,
    request_count: Arc<AtomicUsize>,
) {
    if read_request_headers(&mut socket).await.is_err() {
        return;
    }

    let index = request_count.fetch_add(1, Ordering::AcqRel);
    let response = scripts
        .get(index)
        .cloned()
        .unwrap_or_else(|| token_stream(500, &[]));

    let headers = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/x-ndjson\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n",
        response.status,
        status_reason(response.status),
    );

    if socket.write_all(headers.as_bytes()).await.is_err() {
        return;
    }

    for chunk in response.chunks {
        if chunk.delay_ms > 0 {
            sleep(Duration::from_millis(chunk.delay_ms)).await;
        }
        if chunk.bytes.is_empty() {
            continue;
        }
        let prefix = format!("{:X}\r\n", chunk.bytes.len());
        if socket.write_all(prefix.as_bytes()).await.is_err() {
            return;
        }
        if socket.write_all(&chunk.bytes).await.is_err() {
            return;
        }
        if socket.write_all(b"\r\n").await.is_err() {
            return;
        }
    }

    let _ = socket.write_all(b"0\r\n\r\n").await;
    let _ = socket.shutdown().await;
}

async fn read_request_headers(socket: &mut TcpStream) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buffer = [0_u8; 2048];

    loop {
        let n = socket.read(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buffer[..n]);
        if request.windows(4).any(|window| window == b"\r\n\r\n") {
            return Ok(());
        }
    }
}
