//! CLI command handlers for chat, token, and fingerprint.

use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use super::{ChatArgs, TokenArgs};
use crate::agent::{AgentSession, EventSink, SessionEvent};
use crate::auth::CredentialStore;
use crate::config::SessionConfig;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Handle `cortex-agent chat [PROMPT]`.
pub async fn handle_chat(mut config: SessionConfig, args: ChatArgs) -> CliResult {
    if let Some(model) = args.model {
        config.model = model;
    }

    let sink: EventSink = Arc::new(|event| match event {
        SessionEvent::TextDelta(text) => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        SessionEvent::ToolRequested { query, .. } => eprintln!("\n⚡ sql_exec: {query}"),
        SessionEvent::ToolCompleted { query_id, .. } => eprintln!("  ✅ query_id {query_id}"),
        SessionEvent::ToolFailed { message, .. } => eprintln!("  ❌ {message}"),
        _ => {}
    });

    let mut session = AgentSession::from_config(config)?.with_event_sink(sink);
    session.start_conversation();

    if let Some(prompt) = args.prompt {
        return run_turn(&mut session, &prompt, args.debug_chunks).await;
    }

    eprintln!("Type a question. /new starts a new conversation, /quit exits.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/new" => {
                let id = session.start_conversation();
                eprintln!("New conversation {id}");
            }
            prompt => {
                if let Err(e) = run_turn(&mut session, prompt, args.debug_chunks).await {
                    eprintln!("❌ {e}");
                }
            }
        }
    }
    Ok(())
}

async fn run_turn(session: &mut AgentSession, prompt: &str, debug_chunks: bool) -> CliResult {
    let result = session.send_message(prompt).await;
    println!();

    if debug_chunks {
        for chunk in session.debug_chunks() {
            eprintln!("  · {chunk}");
        }
        let stats = session.last_stats();
        eprintln!(
            "  · {} chunks, {} malformed, {} ignored",
            stats.chunks, stats.malformed, stats.ignored
        );
    }

    match result.error {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Handle `cortex-agent token`.
pub fn handle_token(config: &SessionConfig, args: &TokenArgs) -> CliResult {
    let credentials = config.credential_store()?.credentials()?;
    let token = config
        .issuer()
        .issue(&credentials.identity, &credentials.key)?;

    println!("{}", serde_json::to_string_pretty(&token.claims()?)?);
    println!("expires_at: {}", token.expires_at.to_rfc3339());
    if args.show_token {
        println!("{}", token.token);
    }
    Ok(())
}

/// Handle `cortex-agent fingerprint`.
pub fn handle_fingerprint(config: &SessionConfig) -> CliResult {
    let credentials = config.credential_store()?.credentials()?;
    println!("{}", credentials.key.fingerprint());
    eprintln!(
        "Register with: ALTER USER {} SET RSA_PUBLIC_KEY='<base64 body of the public key>';",
        credentials.identity.user.to_uppercase()
    );
    Ok(())
}
