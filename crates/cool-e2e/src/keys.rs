//! Brace-escaped key sequences
//!
//! Text typed into the document may contain special keys written in braces,
//! e.g. `"{ctrl}a"`, `"{shift}{leftarrow}"` or `"hello{enter}"`. A modifier
//! stays held for the rest of the sequence. `{{}` types a literal `{`.

use crate::errors::E2eError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NamedKey {
    Enter,
    Delete,
    Backspace,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    Escape,
    Tab,
    PageUp,
    PageDown,
}

impl NamedKey {
    /// DOM `KeyboardEvent.key` value.
    pub fn key_name(self) -> &'static str {
        match self {
            NamedKey::Enter => "Enter",
            NamedKey::Delete => "Delete",
            NamedKey::Backspace => "Backspace",
            NamedKey::ArrowUp => "ArrowUp",
            NamedKey::ArrowDown => "ArrowDown",
            NamedKey::ArrowLeft => "ArrowLeft",
            NamedKey::ArrowRight => "ArrowRight",
            NamedKey::Home => "Home",
            NamedKey::End => "End",
            NamedKey::Escape => "Escape",
            NamedKey::Tab => "Tab",
            NamedKey::PageUp => "PageUp",
            NamedKey::PageDown => "PageDown",
        }
    }

    /// Name used inside braces in a key sequence.
    pub fn escape_name(self) -> &'static str {
        match self {
            NamedKey::Enter => "enter",
            NamedKey::Delete => "del",
            NamedKey::Backspace => "backspace",
            NamedKey::ArrowUp => "uparrow",
            NamedKey::ArrowDown => "downarrow",
            NamedKey::ArrowLeft => "leftarrow",
            NamedKey::ArrowRight => "rightarrow",
            NamedKey::Home => "home",
            NamedKey::End => "end",
            NamedKey::Escape => "esc",
            NamedKey::Tab => "tab",
            NamedKey::PageUp => "pageup",
            NamedKey::PageDown => "pagedown",
        }
    }

    /// Windows virtual key code, which Chrome needs for non-text keys.
    pub fn virtual_key_code(self) -> i64 {
        match self {
            NamedKey::Enter => 13,
            NamedKey::Delete => 46,
            NamedKey::Backspace => 8,
            NamedKey::ArrowUp => 38,
            NamedKey::ArrowDown => 40,
            NamedKey::ArrowLeft => 37,
            NamedKey::ArrowRight => 39,
            NamedKey::Home => 36,
            NamedKey::End => 35,
            NamedKey::Escape => 27,
            NamedKey::Tab => 9,
            NamedKey::PageUp => 33,
            NamedKey::PageDown => 34,
        }
    }

    /// Text the key inserts on its own, if any.
    pub fn text(self) -> Option<&'static str> {
        match self {
            NamedKey::Enter => Some("\r"),
            NamedKey::Tab => Some("\t"),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Char(char),
    Named(NamedKey),
}

/// Held modifier keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        shift: false,
        alt: false,
        meta: false,
    };

    pub fn is_empty(&self) -> bool {
        *self == Modifiers::NONE
    }

    /// DevTools `Input.dispatchKeyEvent` modifier bit field.
    pub fn bits(&self) -> i64 {
        let mut bits = 0;
        if self.alt {
            bits |= 1;
        }
        if self.ctrl {
            bits |= 2;
        }
        if self.meta {
            bits |= 4;
        }
        if self.shift {
            bits |= 8;
        }
        bits
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyStroke {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyStroke {
    pub fn char(c: char) -> Self {
        Self {
            key: Key::Char(c),
            modifiers: Modifiers::NONE,
        }
    }

    pub fn named(key: NamedKey) -> Self {
        Self {
            key: Key::Named(key),
            modifiers: Modifiers::NONE,
        }
    }
}

impl fmt::Display for KeyStroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.ctrl {
            write!(f, "{{ctrl}}")?;
        }
        if self.modifiers.shift {
            write!(f, "{{shift}}")?;
        }
        if self.modifiers.alt {
            write!(f, "{{alt}}")?;
        }
        if self.modifiers.meta {
            write!(f, "{{meta}}")?;
        }
        match self.key {
            Key::Char('{') => write!(f, "{{{{}}"),
            Key::Char(c) => write!(f, "{c}"),
            Key::Named(named) => write!(f, "{{{}}}", named.escape_name()),
        }
    }
}

enum Token {
    Modifier(fn(&mut Modifiers)),
    Key(Key),
}

fn lookup(name: &str) -> Option<Token> {
    let token = match name.to_ascii_lowercase().as_str() {
        "ctrl" | "control" => Token::Modifier(|m| m.ctrl = true),
        "shift" => Token::Modifier(|m| m.shift = true),
        "alt" | "option" => Token::Modifier(|m| m.alt = true),
        "meta" | "cmd" | "command" => Token::Modifier(|m| m.meta = true),
        "{" => Token::Key(Key::Char('{')),
        "enter" => Token::Key(Key::Named(NamedKey::Enter)),
        "del" | "delete" => Token::Key(Key::Named(NamedKey::Delete)),
        "backspace" => Token::Key(Key::Named(NamedKey::Backspace)),
        "uparrow" => Token::Key(Key::Named(NamedKey::ArrowUp)),
        "downarrow" => Token::Key(Key::Named(NamedKey::ArrowDown)),
        "leftarrow" => Token::Key(Key::Named(NamedKey::ArrowLeft)),
        "rightarrow" => Token::Key(Key::Named(NamedKey::ArrowRight)),
        "home" => Token::Key(Key::Named(NamedKey::Home)),
        "end" => Token::Key(Key::Named(NamedKey::End)),
        "esc" | "escape" => Token::Key(Key::Named(NamedKey::Escape)),
        "tab" => Token::Key(Key::Named(NamedKey::Tab)),
        "pageup" => Token::Key(Key::Named(NamedKey::PageUp)),
        "pagedown" => Token::Key(Key::Named(NamedKey::PageDown)),
        _ => return None,
    };
    Some(token)
}

/// Parse a key sequence into individual key strokes.
pub fn parse_key_sequence(input: &str) -> Result<Vec<KeyStroke>, E2eError> {
    let mut strokes = Vec::new();
    let mut modifiers = Modifiers::NONE;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            strokes.push(KeyStroke {
                key: Key::Char(ch),
                modifiers,
            });
            continue;
        }

        // `{{}` is the escape for a literal brace, so the first `{` after an
        // opening one belongs to the name.
        let mut name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            name.push('{');
        }
        let mut closed = false;
        for next in chars.by_ref() {
            if next == '}' {
                closed = true;
                break;
            }
            name.push(next);
        }
        if !closed {
            return Err(E2eError::InvalidKeySequence(format!(
                "unterminated special key '{{{name}' in {input:?}"
            )));
        }

        match lookup(&name) {
            Some(Token::Modifier(apply)) => apply(&mut modifiers),
            Some(Token::Key(key)) => strokes.push(KeyStroke { key, modifiers }),
            None => {
                return Err(E2eError::InvalidKeySequence(format!(
                    "unknown special key '{{{name}}}' in {input:?}"
                )))
            }
        }
    }

    Ok(strokes)
}
