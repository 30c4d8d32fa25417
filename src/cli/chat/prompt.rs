use rustyline::{Cmd, Config, Editor, KeyCode, KeyEvent, Modifiers, Result};

pub fn generate_prompt(custom_prompt: Option<&str>) -> String {
    custom_prompt.unwrap_or("> ").to_string()
}

/// Line editor where Enter submits and Alt+Enter inserts a newline.
pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(false)
        .build();
    let mut editor = Editor::with_config(config)?;
    editor.bind_sequence(KeyEvent(KeyCode::Enter, Modifiers::ALT), Cmd::Newline);
    Ok(editor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt() {
        assert_eq!(generate_prompt(None), "> ");
        assert_eq!(generate_prompt(Some("chat> ")), "chat> ");
    }
}
