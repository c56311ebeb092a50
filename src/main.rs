use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chat_api::{ChatApiClient, ChatApiConfig};
use chat_client::{ChatSession, SessionStatus};
use chat_store::{state_file_path, ChatStore, FileSlot, StorageSlot};

pub const ENDPOINT_ENV_VAR: &str = "CHAT_API_ENDPOINT";
pub const STATE_DIR_ENV_VAR: &str = "CHAT_CLIENT_STATE_DIR";

const HELP_TEXT: &str =
    "Commands: /new, /chats, /open <id>, /delete <id>, /clear, /retry, /help, /quit";

fn main() -> io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let base_url = std::env::var(ENDPOINT_ENV_VAR).unwrap_or_default();
    let state_dir = std::env::var(STATE_DIR_ENV_VAR)
        .map(PathBuf::from)
        .or_else(|_| std::env::current_dir())?;

    let client =
        ChatApiClient::new(ChatApiConfig::new(base_url)).map_err(io::Error::other)?;
    let store = ChatStore::load(FileSlot::new(state_file_path(&state_dir)));
    let mut session = ChatSession::new(client, store);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    println!("{HELP_TEXT}");
    print_conversations(&session);

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input {
            "/quit" => break,
            "/help" => println!("{HELP_TEXT}"),
            "/new" => {
                session.start_new_conversation();
                println!("started a new chat");
            }
            "/chats" => print_conversations(&session),
            "/clear" => session.clear_active_conversation(),
            "/retry" => runtime.block_on(run_turn(&mut session, None)),
            _ => {
                if let Some(id) = input.strip_prefix("/open ") {
                    session.select_conversation(id.trim());
                    print_messages(&session);
                } else if let Some(id) = input.strip_prefix("/delete ") {
                    session.delete_conversation(id.trim());
                } else if input.starts_with('/') {
                    println!("unknown command; {HELP_TEXT}");
                } else {
                    runtime.block_on(run_turn(&mut session, Some(input)));
                }
            }
        }

        if let Some(error) = session.error() {
            eprintln!("error: {error}");
        }
    }

    Ok(())
}

async fn run_turn<S: StorageSlot>(session: &mut ChatSession<S>, prompt: Option<&str>) {
    let mut on_token = |text: &str| {
        print!("{text}");
        let _ = io::stdout().flush();
    };

    match prompt {
        Some(prompt) => session.send(prompt, None, &mut on_token).await,
        None => session.retry(None, &mut on_token).await,
    }

    if session.status() != SessionStatus::Error {
        println!();
    }
}

fn print_conversations<S: StorageSlot>(session: &ChatSession<S>) {
    let summaries = session.store().conversation_list();
    if summaries.is_empty() {
        println!("no chats yet; type a prompt to start one");
        return;
    }

    for summary in summaries {
        let marker = if session.store().active_conversation_id() == Some(summary.id.as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {}  {} ({} messages)",
            summary.id, summary.title, summary.message_count
        );
    }
}

fn print_messages<S: StorageSlot>(session: &ChatSession<S>) {
    for message in session.store().messages() {
        let role = match message.role {
            chat_store::Role::User => "you",
            chat_store::Role::Assistant => "assistant",
        };
        println!("{role}: {}", message.content);
    }
}
