//! Terminal front end
//!
//! Input lines go straight to the session store. Output is driven entirely by
//! the store's state channel: the renderer diffs each published state against
//! what it has already printed.

use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::conversation::{Message, Role};
use crate::core::{SessionState, SessionStore};
use crate::providers::CompletionTransport;

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Say(&'a str),
    Clear,
    Dismiss,
    Quit,
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let trimmed = line.trim();
        match trimmed {
            "/quit" | "/exit" => Command::Quit,
            "/clear" => Command::Clear,
            "/dismiss" => Command::Dismiss,
            _ if trimmed.starts_with('/') => Command::Unknown(trimmed),
            _ => Command::Say(line),
        }
    }
}

/// Prints the difference between successive session states
pub struct Renderer<W> {
    out: W,
    agent_name: String,
    shown: Vec<Message>,
    was_pending: bool,
    shown_error: Option<String>,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, agent_name: impl Into<String>) -> Self {
        Self {
            out,
            agent_name: agent_name.into(),
            shown: Vec::new(),
            was_pending: false,
            shown_error: None,
        }
    }

    pub fn render(&mut self, state: &SessionState) -> io::Result<()> {
        let common = self
            .shown
            .iter()
            .zip(&state.transcript)
            .take_while(|(shown, current)| shown == current)
            .count();

        // a failed send always leaves an error behind; a reset never does
        let reset = state.transcript.is_empty() && state.last_error.is_none();
        if reset && !self.shown.is_empty() {
            writeln!(self.out, "--- new conversation ---")?;
        } else {
            for dropped in &self.shown[common..] {
                writeln!(self.out, "(not delivered: {})", dropped.content)?;
            }
        }

        for message in &state.transcript[common..] {
            match message.role {
                Role::User => writeln!(self.out, "you> {}", message.content)?,
                Role::Assistant => writeln!(self.out, "{}> {}", self.agent_name, message.content)?,
            }
        }

        if state.pending && !self.was_pending {
            writeln!(self.out, "{} is thinking...", self.agent_name)?;
        }

        if state.last_error != self.shown_error {
            if let Some(error) = &state.last_error {
                writeln!(self.out, "error: {} (/dismiss to hide)", error)?;
            }
        }

        self.shown = state.transcript.clone();
        self.was_pending = state.pending;
        self.shown_error = state.last_error.clone();
        self.out.flush()
    }
}

/// Run an interactive session on stdin/stdout until `/quit` or end of input
pub async fn run<T: CompletionTransport>(
    store: SessionStore<T>,
    agent_name: &str,
) -> anyhow::Result<()> {
    println!(
        "Chatting with {}. Commands: /clear, /dismiss, /quit",
        agent_name
    );

    let mut rx = store.subscribe();
    let mut renderer = Renderer::new(io::stdout(), agent_name);
    let render = tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = rx.borrow_and_update().clone();
            if let Err(e) = renderer.render(&state) {
                tracing::error!(error = %e, "failed to write transcript");
                break;
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Quit => break,
            Command::Clear => store.reset_session(),
            Command::Dismiss => store.clear_error(),
            Command::Unknown(name) => println!("unknown command {}", name),
            Command::Say(text) => {
                store.send_message(text).await;
            }
        }
    }

    // dropping the store closes the channel and ends the render task
    drop(store);
    render.await?;
    Ok(())
}
