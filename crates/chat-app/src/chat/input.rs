/// What a press of the primary submit key resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnterAction {
    /// Plain Enter: the caller should attempt a send.
    Submit,
    /// Shift+Enter: a line break was inserted and nothing is sent.
    Newline,
}

/// Text being composed before it is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputBuffer {
    text: String,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn insert_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn clear(&mut self) {
        self.text.clear();
    }

    /// Applies the Enter contract; `shift` is the line-break modifier.
    pub fn press_enter(&mut self, shift: bool) -> EnterAction {
        if shift {
            self.text.push('\n');
            EnterAction::Newline
        } else {
            EnterAction::Submit
        }
    }
}
