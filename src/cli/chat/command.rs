/// A line entered at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    History,
    Quit,
    Unknown(String),
    /// Text to send to the endpoint, as typed.
    Message(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();

        match trimmed {
            "/help" => Command::Help,
            "/history" => Command::History,
            "/quit" | "/exit" => Command::Quit,
            // "//text" escapes a message that starts with a slash
            _ if trimmed.starts_with("//") => Command::Message(line.trim_start()[1..].to_string()),
            _ if trimmed.starts_with('/') => {
                let name = trimmed.split_whitespace().next().unwrap_or(trimmed);
                Command::Unknown(name.to_string())
            }
            _ => Command::Message(line.to_string()),
        }
    }
}
