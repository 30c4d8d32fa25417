pub mod command;
pub mod conversation_state;
pub mod prompt;
pub mod render;
pub mod submission;

use std::io::Write;
use std::process::ExitCode;

use command::Command;
use conversation_state::{ConversationStore, Message, StoreEvent};
use eyre::Result;
use prompt::generate_prompt;
use render::Renderer;
use rustyline::error::ReadlineError;
use submission::{SubmissionController, SubmitOutcome};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::chat_client::ChatTransport;

const WELCOME_TEXT: &str = "
Faith AI Chat

Type a message and press Enter to send it.
Alt+Enter starts a new line.

/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
Faith AI Chat

/history      Show the whole conversation
/help         Show this help dialogue
/quit         Quit the application

//text        Send a message that starts with a slash
";

/// Whether the prompt loop should keep going after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct ChatContext<T> {
    renderer: Renderer,
    input: Option<String>,
    interactive: bool,
    controller: SubmissionController<T>,
    events: broadcast::Receiver<StoreEvent>,
}

impl<T: ChatTransport> ChatContext<T> {
    pub fn new(
        output: Box<dyn Write>,
        input: Option<String>,
        interactive: bool,
        decorated: bool,
        transport: T,
    ) -> Self {
        let store = ConversationStore::new();
        let events = store.subscribe();

        Self {
            renderer: Renderer::new(output, decorated),
            input,
            interactive,
            controller: SubmissionController::new(store, transport),
            events,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        self.controller.store()
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        if self.interactive {
            self.print_welcome()?;
        }

        // Non-interactive mode (single query)
        if let Some(input) = self.input.take() {
            self.handle_input(&input).await?;
            let code = if self.store().last_error().is_some() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            return Ok(code);
        }

        if self.interactive {
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    fn print_welcome(&mut self) -> Result<()> {
        self.renderer.write_line(WELCOME_TEXT)
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;

        loop {
            let prompt_text = generate_prompt(None);

            match rl.readline(&prompt_text) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if self.handle_input(&line).await? == Flow::Quit {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => {
                    self.renderer.write_line(&format!("Error: {}", e))?;
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, line: &str) -> Result<Flow> {
        match Command::parse(line) {
            Command::Help => self.renderer.write_line(HELP_TEXT)?,
            Command::History => {
                let state = self.store().snapshot();
                self.renderer.render_history(&state.messages)?;
                if let Some(error) = &state.last_error {
                    self.renderer.render_error(error)?;
                }
            }
            Command::Quit => return Ok(Flow::Quit),
            Command::Unknown(name) => {
                let notice = Message::system(format!("Unknown command {}. Type /help for a list.", name));
                self.renderer.render_message(&notice)?;
            }
            Command::Message(text) => {
                self.process_chat_input(&text).await?;
            }
        }

        Ok(Flow::Continue)
    }

    /// Submits `text` while rendering store notifications as they arrive.
    async fn process_chat_input(&mut self, text: &str) -> Result<SubmitOutcome> {
        self.controller.store().set_input(text);

        let outcome = {
            let submit = self.controller.submit(text);
            tokio::pin!(submit);

            loop {
                tokio::select! {
                    outcome = &mut submit => break outcome,
                    event = self.events.recv() => match event {
                        Ok(event) => self.renderer.render_event(&event)?,
                        Err(RecvError::Lagged(skipped)) => warn!("Renderer skipped {} store events", skipped),
                        Err(RecvError::Closed) => {}
                    },
                }
            }
        };

        self.drain_events()?;
        debug!("Submission finished: {:?}", outcome);
        Ok(outcome)
    }

    fn drain_events(&mut self) -> Result<()> {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.renderer.render_event(&event)?,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Renderer skipped {} store events", skipped);
                }
                Err(_) => return Ok(()),
            }
        }
    }
}
