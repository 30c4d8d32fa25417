use std::collections::HashSet;
use std::io::Write;

use color_print::cformat;
use crossterm::cursor::MoveToColumn;
use crossterm::style::{Stylize, style};
use crossterm::terminal::{Clear, ClearType};
use crossterm::queue;
use eyre::Result;
use uuid::Uuid;

use crate::cli::chat::conversation_state::{Message, Role, StoreEvent};

const STATUS_TEXT: &str = "Thinking...";

/// Writes the conversation to a terminal (or any writer).
///
/// Messages are keyed by id and printed at most once, unless the whole log
/// is replayed with [`Renderer::render_history`]. With `decorated` off the
/// output is plain text without colors or the transient status line.
pub struct Renderer {
    output: Box<dyn Write>,
    decorated: bool,
    rendered: HashSet<Uuid>,
    status_visible: bool,
}

impl Renderer {
    pub fn new(output: Box<dyn Write>, decorated: bool) -> Self {
        Self {
            output,
            decorated,
            rendered: HashSet::new(),
            status_visible: false,
        }
    }

    pub fn render_event(&mut self, event: &StoreEvent) -> Result<()> {
        match event {
            StoreEvent::MessageAppended(message) => {
                if self.rendered.insert(message.id()) {
                    self.clear_status()?;
                    self.write_message(message)?;
                }
            }
            StoreEvent::PendingChanged(true) => self.show_status()?,
            StoreEvent::PendingChanged(false) => self.clear_status()?,
            StoreEvent::ErrorChanged(Some(error)) => self.render_error(error)?,
            StoreEvent::ErrorChanged(None) | StoreEvent::InputCleared => {}
        }

        self.output.flush()?;
        Ok(())
    }

    pub fn render_history(&mut self, messages: &[Message]) -> Result<()> {
        if messages.is_empty() {
            return self.write_line("No messages yet.");
        }

        for message in messages {
            self.rendered.insert(message.id());
            self.write_message(message)?;
        }
        Ok(())
    }

    /// Prints a message that is not part of the conversation log.
    pub fn render_message(&mut self, message: &Message) -> Result<()> {
        self.clear_status()?;
        self.write_message(message)?;
        self.output.flush()?;
        Ok(())
    }

    pub fn render_error(&mut self, error: &str) -> Result<()> {
        self.clear_status()?;
        let line = format!("Error: {}", error);
        if self.decorated {
            writeln!(self.output, "{}", style(line).red())?;
        } else {
            writeln!(self.output, "{}", line)?;
        }
        Ok(())
    }

    pub fn write_line(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{}", text)?;
        self.output.flush()?;
        Ok(())
    }

    fn write_message(&mut self, message: &Message) -> Result<()> {
        let (ts, label, text) = (message.timestamp(), message.role().label(), message.text());

        let line = if !self.decorated {
            format!("[{}] {}: {}", ts, label, text)
        } else {
            match message.role() {
                Role::User => cformat!("<dim>[{}]</> <blue,bold>{}:</> {}", ts, label, text),
                Role::Assistant => cformat!("<dim>[{}]</> <green,bold>{}:</> {}", ts, label, text),
                Role::System => cformat!("<dim>[{}]</> <yellow,bold>{}:</> <italic>{}</>", ts, label, text),
            }
        };

        writeln!(self.output, "{}", line)?;
        Ok(())
    }

    fn show_status(&mut self) -> Result<()> {
        if self.decorated && !self.status_visible {
            write!(self.output, "{}", style(STATUS_TEXT).dark_grey())?;
            self.status_visible = true;
        }
        Ok(())
    }

    fn clear_status(&mut self) -> Result<()> {
        if self.status_visible {
            queue!(self.output, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
            self.status_visible = false;
        }
        Ok(())
    }
}
