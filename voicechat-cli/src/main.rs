use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;
use voicechat_appcore::{ChatService, VoiceController, VoiceUpdate};
use voicechat_core::types::{ChatMessage, Role};
use voicechat_engine::recognition::{RecognitionError, RecognitionSessionManager};
use voicechat_runtime::ConfigStore;
use voicechat_runtime::LoopbackRecognizer;
use voicechat_runtime::defaults::{apply_env_overrides, config_path, process_env};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Listen,
    Stop,
    Say(String),
    Clear,
    Quit,
    Type(String),
    Nothing,
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "" => Command::Nothing,
            "/listen" => Command::Listen,
            "/stop" => Command::Stop,
            "/clear" => Command::Clear,
            "/quit" | "/exit" => Command::Quit,
            _ => match line.strip_prefix("/say") {
                Some(rest) if rest.is_empty() || rest.starts_with(' ') => {
                    Command::Say(rest.trim().to_string())
                }
                _ => Command::Type(line.to_string()),
            },
        }
    }
}

fn print_message(m: &ChatMessage) {
    let who = match m.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    println!("{who}> {}", m.content);
}

fn print_fault(e: &RecognitionError) {
    match e {
        RecognitionError::PermissionRequired => {
            println!("[voice] microphone permission is required; voice input is off")
        }
        other => println!("[voice] {other}; use /listen to try again"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let store = ConfigStore::at_path(config_path(process_env));
    let mut cfg = store.load_or_default()?;
    apply_env_overrides(&mut cfg, process_env);

    let chat = ChatService::from_config(&cfg);
    if let Some(outcome) = chat.restore().await? {
        if outcome.should_reset() {
            println!("(previous conversation expired; starting fresh)");
        }
    }
    for m in chat.transcript().await {
        print_message(&m);
    }

    let (recognizer, mic, events) = LoopbackRecognizer::new(&cfg.recognition);
    let manager = RecognitionSessionManager::new(Box::new(recognizer), &cfg.recognition, &cfg.wake);
    let voice = Arc::new(VoiceController::new(manager, chat.clone()));

    let pump = {
        let voice = voice.clone();
        tokio::spawn(async move {
            voice
                .run(events, |update| match update {
                    VoiceUpdate::WakeDetected => println!("[voice] listening for a command"),
                    VoiceUpdate::Reply { command, reply } => {
                        print_message(&ChatMessage::user(command));
                        print_message(&reply);
                    }
                    VoiceUpdate::Stopped => println!("[voice] stopped"),
                    VoiceUpdate::Fault(e) => print_fault(&e),
                    VoiceUpdate::Quiet => {}
                })
                .await;
        })
    };

    println!(
        "server: {}  say \"{} {}\" to wake. commands: /listen /stop /say <text> /clear /quit",
        cfg.client.server_url, cfg.wake.wake_token, cfg.wake.trigger_token
    );
    match voice.auto_start(&cfg.recognition).await {
        Some(Ok(())) => println!("[voice] on"),
        Some(Err(e)) => print_fault(&e),
        None => {}
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Nothing => {}
            Command::Listen => match voice.activate().await {
                Ok(()) => println!("[voice] on"),
                Err(e) => print_fault(&e),
            },
            Command::Stop => {
                voice.deactivate().await;
                println!("[voice] off");
            }
            Command::Say(text) => {
                if !mic.inject(&text) {
                    println!("[voice] not listening; use /listen first");
                }
            }
            Command::Clear => {
                chat.clear().await?;
                println!("(chat cleared)");
            }
            Command::Quit => break,
            Command::Type(text) => {
                if let Some(reply) = chat.send_text(&text).await {
                    print_message(&reply);
                }
            }
        }
    }

    voice.deactivate().await;
    pump.abort();
    Ok(())
}
