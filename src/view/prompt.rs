//! Prompt/minibuffer for the status line

/// Type of prompt - determines what action to take when user confirms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptType {
    /// Load a file into the current document
    OpenFile,
    /// Insert a file at the cursor
    InsertFile,
    /// Save current document under a new name
    SaveFileAs,
    /// Write the selection to a file
    SaveSelection,
    /// Search for text
    Search,
    /// Search text for a replace-all (will prompt for replacement after)
    ReplaceSearch,
    /// Replacement text for a replace-all
    Replace { search: String },
    /// Search text for a query-replace (will prompt for replacement after)
    QueryReplaceSearch,
    /// Replacement text for a query-replace
    QueryReplace { search: String },
    /// Segment number to switch to
    SwitchDocument,
    /// Confirm overwriting an existing file
    ConfirmOverwrite { name: String },
    /// Confirm quitting with modified documents
    ConfirmQuit,
}

/// Prompt state for the minibuffer
#[derive(Debug, Clone)]
pub struct Prompt {
    /// The prompt message (e.g., "Find: ")
    pub message: String,
    /// User's current input
    pub input: String,
    /// Cursor position in the input, in bytes
    pub cursor_pos: usize,
    /// What to do when user confirms
    pub prompt_type: PromptType,
}

impl Prompt {
    /// Create a new prompt
    pub fn new(message: String, prompt_type: PromptType) -> Self {
        Self {
            message,
            input: String::new(),
            cursor_pos: 0,
            prompt_type,
        }
    }

    /// Create a new prompt with initial text
    pub fn with_initial_text(
        message: String,
        prompt_type: PromptType,
        initial_text: String,
    ) -> Self {
        let cursor_pos = initial_text.len();
        Self {
            message,
            input: initial_text,
            cursor_pos,
            prompt_type,
        }
    }

    /// Move cursor left by one character
    pub fn cursor_left(&mut self) {
        if let Some((i, _)) = self.input[..self.cursor_pos].char_indices().next_back() {
            self.cursor_pos = i;
        }
    }

    /// Move cursor right by one character
    pub fn cursor_right(&mut self) {
        if let Some(c) = self.input[self.cursor_pos..].chars().next() {
            self.cursor_pos += c.len_utf8();
        }
    }

    /// Insert a character at the cursor position
    pub fn insert_char(&mut self, ch: char) {
        self.input.insert(self.cursor_pos, ch);
        self.cursor_pos += ch.len_utf8();
    }

    /// Delete one character before cursor (backspace)
    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            let prev_boundary = self.input[..self.cursor_pos]
                .char_indices()
                .next_back()
                .map(|(i, _)| i)
                .unwrap_or(0);
            self.input.drain(prev_boundary..self.cursor_pos);
            self.cursor_pos = prev_boundary;
        }
    }

    /// Delete character at cursor (delete key)
    pub fn delete(&mut self) {
        if let Some(c) = self.input[self.cursor_pos..].chars().next() {
            self.input
                .drain(self.cursor_pos..self.cursor_pos + c.len_utf8());
        }
    }

    /// Move to start of input
    pub fn move_to_start(&mut self) {
        self.cursor_pos = 0;
    }

    /// Move to end of input
    pub fn move_to_end(&mut self) {
        self.cursor_pos = self.input.len();
    }

    /// Replace the input and move the cursor to the end.
    pub fn set_input(&mut self, text: String) {
        self.cursor_pos = text.len();
        self.input = text;
    }

    /// Delete from cursor to end of line (Ctrl+K).
    pub fn delete_to_end(&mut self) {
        self.input.truncate(self.cursor_pos);
    }

    /// Get the current input text
    pub fn get_text(&self) -> String {
        self.input.clone()
    }

    /// Clear the input
    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// The full status-line text and the cursor column within it.
    pub fn display(&self) -> (String, usize) {
        let text = format!("{}{}", self.message, self.input);
        let col = self.message.chars().count() + self.input[..self.cursor_pos].chars().count();
        (text, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_backspace() {
        let mut prompt = Prompt::new("Find: ".to_string(), PromptType::Search);
        for c in "abc".chars() {
            prompt.insert_char(c);
        }
        assert_eq!(prompt.input, "abc");
        prompt.cursor_left();
        prompt.backspace();
        assert_eq!(prompt.input, "ac");
        assert_eq!(prompt.cursor_pos, 1);
    }

    #[test]
    fn test_delete_forward_basic() {
        let mut prompt = Prompt::with_initial_text(
            "Open: ".to_string(),
            PromptType::OpenFile,
            "notes.txt".to_string(),
        );
        prompt.move_to_start();
        prompt.delete();
        assert_eq!(prompt.input, "otes.txt");
        prompt.move_to_end();
        prompt.delete();
        assert_eq!(prompt.input, "otes.txt");
    }

    #[test]
    fn test_multibyte_cursor_motion() {
        let mut prompt = Prompt::new("Find: ".to_string(), PromptType::Search);
        prompt.set_input("héllo".to_string());
        prompt.move_to_start();
        prompt.cursor_right();
        prompt.cursor_right();
        assert_eq!(prompt.cursor_pos, 3);
        prompt.backspace();
        assert_eq!(prompt.input, "hllo");
    }

    #[test]
    fn test_delete_to_end_and_clear() {
        let mut prompt = Prompt::new("Save as: ".to_string(), PromptType::SaveFileAs);
        prompt.set_input("hello world".to_string());
        prompt.cursor_pos = 5;
        prompt.delete_to_end();
        assert_eq!(prompt.get_text(), "hello");
        prompt.clear();
        assert_eq!(prompt.input, "");
        assert_eq!(prompt.cursor_pos, 0);
    }

    #[test]
    fn test_display_cursor_column() {
        let mut prompt = Prompt::new("Find: ".to_string(), PromptType::Search);
        prompt.set_input("ab".to_string());
        prompt.cursor_left();
        assert_eq!(prompt.display(), ("Find: ab".to_string(), 7));
    }
}
