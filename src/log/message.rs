//! A single emitted log record and its rendering.

use super::level::Level;

#[derive(Debug, Clone)]
pub struct Message {
    pub level: Level,
    pub tags: Vec<String>,
    pub text: String,
}

impl Message {
    pub fn new(level: Level, text: impl Into<String>) -> Self {
        Message {
            level,
            tags: Vec::new(),
            text: text.into(),
        }
    }

    pub fn with_tags(level: Level, tags: Vec<String>, text: impl Into<String>) -> Self {
        Message {
            level,
            tags,
            text: text.into(),
        }
    }

    /// Render as `[LEVEL][tag1][tag2] text`, omitting the level bracket
    /// entirely when the level carries no display text (`disable`).
    pub fn render(&self) -> String {
        let mut out = String::new();
        let display = self.level.display_text();
        if !display.is_empty() {
            out.push('[');
            out.push_str(display);
            out.push(']');
        }
        for tag in &self.tags {
            out.push('[');
            out.push_str(tag);
            out.push(']');
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&self.text);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_level_and_tags_prefix() {
        let msg = Message::with_tags(
            Level::Warn,
            vec!["db".into(), "migrate".into()],
            "slow query",
        );
        assert_eq!(msg.render(), "[WARN][db][migrate] slow query");
    }

    #[test]
    fn renders_bare_text_without_brackets_when_no_tags_and_no_level_text() {
        let msg = Message::new(Level::Disable, "raw passthrough");
        assert_eq!(msg.render(), "raw passthrough");
    }
}
