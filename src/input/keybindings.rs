use crate::config::Config;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::collections::HashMap;

/// High-level actions that can be performed in the editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    // Character input
    InsertChar(char),
    InsertNewline,
    InsertTab,

    // Basic movement
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    MoveLineStart,
    MoveLineEnd,
    MovePageUp,
    MovePageDown,
    MoveDocumentStart,
    MoveDocumentEnd,

    // Editing
    DeleteBackward,
    DeleteForward,

    // Selection and clipboard
    ToggleSelection,
    Copy,
    Cut,
    Paste,

    // Search
    Find,
    FindNext,
    Replace,
    QueryReplace,

    // File operations
    Save,
    SaveAs,
    SaveSelection,
    Open,
    InsertFile,
    Quit,

    // Documents
    NextDocument,
    PrevDocument,
    ListDocuments,

    Cancel,

    // No-op
    None,
}

impl Action {
    /// Parse action from string (used when loading from config)
    pub fn from_str(s: &str, args: &HashMap<String, serde_json::Value>) -> Option<Action> {
        match s {
            "insert_char" => {
                if let Some(serde_json::Value::String(c)) = args.get("char") {
                    c.chars().next().map(Action::InsertChar)
                } else {
                    None
                }
            }
            "insert_newline" => Some(Action::InsertNewline),
            "insert_tab" => Some(Action::InsertTab),

            "move_left" => Some(Action::MoveLeft),
            "move_right" => Some(Action::MoveRight),
            "move_up" => Some(Action::MoveUp),
            "move_down" => Some(Action::MoveDown),
            "move_line_start" => Some(Action::MoveLineStart),
            "move_line_end" => Some(Action::MoveLineEnd),
            "move_page_up" => Some(Action::MovePageUp),
            "move_page_down" => Some(Action::MovePageDown),
            "move_document_start" => Some(Action::MoveDocumentStart),
            "move_document_end" => Some(Action::MoveDocumentEnd),

            "delete_backward" => Some(Action::DeleteBackward),
            "delete_forward" => Some(Action::DeleteForward),

            "toggle_selection" => Some(Action::ToggleSelection),
            "copy" => Some(Action::Copy),
            "cut" => Some(Action::Cut),
            "paste" => Some(Action::Paste),

            "find" => Some(Action::Find),
            "find_next" => Some(Action::FindNext),
            "replace" => Some(Action::Replace),
            "query_replace" => Some(Action::QueryReplace),

            "save" => Some(Action::Save),
            "save_as" => Some(Action::SaveAs),
            "save_selection" => Some(Action::SaveSelection),
            "open" => Some(Action::Open),
            "insert_file" => Some(Action::InsertFile),
            "quit" => Some(Action::Quit),

            "next_document" => Some(Action::NextDocument),
            "prev_document" => Some(Action::PrevDocument),
            "list_documents" => Some(Action::ListDocuments),

            "cancel" => Some(Action::Cancel),

            _ => None,
        }
    }
}

/// Resolves key events to actions based on configuration
#[derive(Debug, Clone)]
pub struct KeybindingResolver {
    /// Map from (key, modifiers) to action
    bindings: HashMap<(KeyCode, KeyModifiers), Action>,

    /// Default bindings (used as fallback)
    default_bindings: HashMap<(KeyCode, KeyModifiers), Action>,
}

impl KeybindingResolver {
    /// Create a new resolver from configuration
    pub fn new(config: &Config) -> Self {
        let mut resolver = Self {
            bindings: HashMap::new(),
            default_bindings: Self::create_default_bindings(),
        };

        // Load bindings from config
        for binding in &config.keybindings {
            let Some(key_code) = Self::parse_key(&binding.key) else {
                tracing::warn!("ignoring binding with unknown key {:?}", binding.key);
                continue;
            };
            let modifiers = Self::parse_modifiers(&binding.modifiers);
            match Action::from_str(&binding.action, &binding.args) {
                Some(action) => {
                    resolver.bindings.insert((key_code, modifiers), action);
                }
                None => tracing::warn!("ignoring binding with unknown action {:?}", binding.action),
            }
        }

        resolver
    }

    /// Resolve a key event to an action
    pub fn resolve(&self, event: &KeyEvent) -> Action {
        tracing::trace!(
            "resolve: code={:?}, modifiers={:?}",
            event.code,
            event.modifiers
        );

        // Try custom bindings first
        if let Some(action) = self.bindings.get(&(event.code, event.modifiers)) {
            return action.clone();
        }

        // Fall back to default bindings
        if let Some(action) = self.default_bindings.get(&(event.code, event.modifiers)) {
            return action.clone();
        }

        // Handle regular character input
        if event.modifiers.is_empty() || event.modifiers == KeyModifiers::SHIFT {
            if let KeyCode::Char(c) = event.code {
                return Action::InsertChar(c);
            }
        }

        Action::None
    }

    /// Parse a key string to KeyCode
    fn parse_key(key: &str) -> Option<KeyCode> {
        match key.to_lowercase().as_str() {
            "enter" => Some(KeyCode::Enter),
            "backspace" => Some(KeyCode::Backspace),
            "delete" | "del" => Some(KeyCode::Delete),
            "tab" => Some(KeyCode::Tab),
            "esc" | "escape" => Some(KeyCode::Esc),
            "space" => Some(KeyCode::Char(' ')),

            "left" => Some(KeyCode::Left),
            "right" => Some(KeyCode::Right),
            "up" => Some(KeyCode::Up),
            "down" => Some(KeyCode::Down),
            "home" => Some(KeyCode::Home),
            "end" => Some(KeyCode::End),
            "pageup" => Some(KeyCode::PageUp),
            "pagedown" => Some(KeyCode::PageDown),

            s if s.len() > 1 && s.starts_with('f') => s[1..].parse().ok().map(KeyCode::F),
            s if s.chars().count() == 1 => s.chars().next().map(KeyCode::Char),
            _ => None,
        }
    }

    /// Parse modifiers from strings
    fn parse_modifiers(modifiers: &[String]) -> KeyModifiers {
        let mut result = KeyModifiers::empty();
        for m in modifiers {
            match m.to_lowercase().as_str() {
                "ctrl" | "control" => result |= KeyModifiers::CONTROL,
                "shift" => result |= KeyModifiers::SHIFT,
                "alt" => result |= KeyModifiers::ALT,
                _ => {}
            }
        }
        result
    }

    /// Create default keybindings
    fn create_default_bindings() -> HashMap<(KeyCode, KeyModifiers), Action> {
        let mut bindings = HashMap::new();
        let none = KeyModifiers::empty();
        let ctrl = KeyModifiers::CONTROL;

        // Basic movement
        bindings.insert((KeyCode::Left, none), Action::MoveLeft);
        bindings.insert((KeyCode::Right, none), Action::MoveRight);
        bindings.insert((KeyCode::Up, none), Action::MoveUp);
        bindings.insert((KeyCode::Down, none), Action::MoveDown);
        bindings.insert((KeyCode::Home, none), Action::MoveLineStart);
        bindings.insert((KeyCode::End, none), Action::MoveLineEnd);
        bindings.insert((KeyCode::Home, ctrl), Action::MoveDocumentStart);
        bindings.insert((KeyCode::End, ctrl), Action::MoveDocumentEnd);
        bindings.insert((KeyCode::PageUp, none), Action::MovePageUp);
        bindings.insert((KeyCode::PageDown, none), Action::MovePageDown);

        // Editing
        bindings.insert((KeyCode::Backspace, none), Action::DeleteBackward);
        bindings.insert((KeyCode::Delete, none), Action::DeleteForward);
        bindings.insert((KeyCode::Enter, none), Action::InsertNewline);
        bindings.insert((KeyCode::Tab, none), Action::InsertTab);

        // Selection and clipboard
        bindings.insert((KeyCode::Char('b'), ctrl), Action::ToggleSelection);
        bindings.insert((KeyCode::Char('c'), ctrl), Action::Copy);
        bindings.insert((KeyCode::Char('x'), ctrl), Action::Cut);
        bindings.insert((KeyCode::Char('v'), ctrl), Action::Paste);

        // Search
        bindings.insert((KeyCode::Char('f'), ctrl), Action::Find);
        bindings.insert((KeyCode::F(3), none), Action::FindNext);
        bindings.insert((KeyCode::Char('r'), ctrl), Action::Replace);
        bindings.insert((KeyCode::Char('r'), KeyModifiers::ALT), Action::QueryReplace);

        // File operations
        bindings.insert((KeyCode::Char('s'), ctrl), Action::Save);
        bindings.insert((KeyCode::Char('s'), KeyModifiers::ALT), Action::SaveAs);
        bindings.insert((KeyCode::Char('w'), ctrl), Action::SaveSelection);
        bindings.insert((KeyCode::Char('o'), ctrl), Action::Open);
        bindings.insert((KeyCode::Char('i'), KeyModifiers::ALT), Action::InsertFile);
        bindings.insert((KeyCode::Char('q'), ctrl), Action::Quit);

        // Documents (Alt+[ and Alt+])
        bindings.insert((KeyCode::Char(']'), KeyModifiers::ALT), Action::NextDocument);
        bindings.insert((KeyCode::Char('['), KeyModifiers::ALT), Action::PrevDocument);
        bindings.insert((KeyCode::Char('l'), ctrl), Action::ListDocuments);

        bindings.insert((KeyCode::Esc, none), Action::Cancel);

        bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Keybinding;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(
            KeybindingResolver::parse_key("enter"),
            Some(KeyCode::Enter)
        );
        assert_eq!(
            KeybindingResolver::parse_key("PageDown"),
            Some(KeyCode::PageDown)
        );
        assert_eq!(KeybindingResolver::parse_key("f3"), Some(KeyCode::F(3)));
        assert_eq!(
            KeybindingResolver::parse_key("f"),
            Some(KeyCode::Char('f'))
        );
        assert_eq!(KeybindingResolver::parse_key("unknown"), None);
    }

    #[test]
    fn test_parse_modifiers() {
        let modifiers = vec!["ctrl".to_string(), "Shift".to_string()];
        assert_eq!(
            KeybindingResolver::parse_modifiers(&modifiers),
            KeyModifiers::CONTROL | KeyModifiers::SHIFT
        );
    }

    #[test]
    fn test_resolve_defaults_and_chars() {
        let resolver = KeybindingResolver::new(&Config::default());
        assert_eq!(
            resolver.resolve(&key(KeyCode::Char('s'), KeyModifiers::CONTROL)),
            Action::Save
        );
        assert_eq!(
            resolver.resolve(&key(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Action::InsertChar('A')
        );
        assert_eq!(
            resolver.resolve(&key(KeyCode::Char('k'), KeyModifiers::CONTROL)),
            Action::None
        );
    }

    #[test]
    fn test_custom_binding_overrides_default() {
        let mut config = Config::default();
        config.keybindings.push(Keybinding {
            key: "s".to_string(),
            modifiers: vec!["ctrl".to_string()],
            action: "find".to_string(),
            args: HashMap::new(),
        });
        let resolver = KeybindingResolver::new(&config);
        assert_eq!(
            resolver.resolve(&key(KeyCode::Char('s'), KeyModifiers::CONTROL)),
            Action::Find
        );
    }

    #[test]
    fn test_action_from_str_with_args() {
        let mut args = HashMap::new();
        args.insert("char".to_string(), serde_json::json!("x"));
        assert_eq!(
            Action::from_str("insert_char", &args),
            Some(Action::InsertChar('x'))
        );
        assert_eq!(Action::from_str("insert_char", &HashMap::new()), None);
        assert_eq!(Action::from_str("bogus", &HashMap::new()), None);
    }
}
