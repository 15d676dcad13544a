//! Key naming. Raw names come either from the hook (a typed character or a lower-case tag such as
//! `ctrl_l`) or from any other engine that prefixes its tags (`Key.space`). [normalize_key] turns
//! all of them into the names stored in the keyboard table.

pub const UNKNOWN_KEY: &str = "UNKNOWN";

/// Printable single characters are upper-cased. Anything longer is treated as a tag: the engine
/// prefix up to the last `.` is stripped and the rest upper-cased. Never fails, unrecognizable
/// input becomes [UNKNOWN_KEY].
pub fn normalize_key(raw: &str) -> String {
    let mut chars = raw.chars();
    match (chars.next(), chars.next()) {
        (None, _) => UNKNOWN_KEY.to_string(),
        (Some(c), None) => normalize_char(c),
        _ => normalize_tag(raw),
    }
}

fn normalize_char(c: char) -> String {
    match c {
        ' ' => "SPACE".to_string(),
        '\t' => "TAB".to_string(),
        '\n' | '\r' => "ENTER".to_string(),
        c if c.is_control() || c.is_whitespace() => UNKNOWN_KEY.to_string(),
        c => c.to_uppercase().collect(),
    }
}

fn normalize_tag(raw: &str) -> String {
    let tag = raw.rsplit('.').next().unwrap_or(raw);
    if !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        tag.to_ascii_uppercase()
    } else {
        UNKNOWN_KEY.to_string()
    }
}

/// Raw name for a key reported by the hook. The typed text wins when it is a single visible
/// character, so layouts other than US keep their own letters.
pub fn rdev_key_name(key: rdev::Key, typed: Option<&str>) -> String {
    if let Some(text) = typed {
        let mut chars = text.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if !c.is_control() && !c.is_whitespace() {
                return text.to_string();
            }
        }
    }
    key_tag(key).to_string()
}

fn key_tag(key: rdev::Key) -> &'static str {
    use rdev::Key;

    match key {
        Key::Alt => "alt_l",
        Key::AltGr => "alt_gr",
        Key::Backspace => "backspace",
        Key::CapsLock => "caps_lock",
        Key::ControlLeft => "ctrl_l",
        Key::ControlRight => "ctrl_r",
        Key::Delete => "delete",
        Key::DownArrow => "down",
        Key::End => "end",
        Key::Escape => "esc",
        Key::F1 => "f1",
        Key::F2 => "f2",
        Key::F3 => "f3",
        Key::F4 => "f4",
        Key::F5 => "f5",
        Key::F6 => "f6",
        Key::F7 => "f7",
        Key::F8 => "f8",
        Key::F9 => "f9",
        Key::F10 => "f10",
        Key::F11 => "f11",
        Key::F12 => "f12",
        Key::Home => "home",
        Key::LeftArrow => "left",
        Key::MetaLeft => "cmd",
        Key::MetaRight => "cmd_r",
        Key::PageDown => "page_down",
        Key::PageUp => "page_up",
        Key::Return | Key::KpReturn => "enter",
        Key::RightArrow => "right",
        Key::ShiftLeft => "shift",
        Key::ShiftRight => "shift_r",
        Key::Space => "space",
        Key::Tab => "tab",
        Key::UpArrow => "up",
        Key::PrintScreen => "print_screen",
        Key::ScrollLock => "scroll_lock",
        Key::Pause => "pause",
        Key::NumLock => "num_lock",
        Key::Insert => "insert",
        Key::Function => "fn",
        Key::BackQuote => "`",
        Key::Num0 | Key::Kp0 => "0",
        Key::Num1 | Key::Kp1 => "1",
        Key::Num2 | Key::Kp2 => "2",
        Key::Num3 | Key::Kp3 => "3",
        Key::Num4 | Key::Kp4 => "4",
        Key::Num5 | Key::Kp5 => "5",
        Key::Num6 | Key::Kp6 => "6",
        Key::Num7 | Key::Kp7 => "7",
        Key::Num8 | Key::Kp8 => "8",
        Key::Num9 | Key::Kp9 => "9",
        Key::Minus | Key::KpMinus => "-",
        Key::Equal => "=",
        Key::KpPlus => "+",
        Key::KpMultiply => "*",
        Key::KpDivide | Key::Slash => "/",
        Key::KpDelete | Key::Dot => ".",
        Key::LeftBracket => "[",
        Key::RightBracket => "]",
        Key::SemiColon => ";",
        Key::Quote => "'",
        Key::BackSlash | Key::IntlBackslash => "\\",
        Key::Comma => ",",
        Key::KeyA => "a",
        Key::KeyB => "b",
        Key::KeyC => "c",
        Key::KeyD => "d",
        Key::KeyE => "e",
        Key::KeyF => "f",
        Key::KeyG => "g",
        Key::KeyH => "h",
        Key::KeyI => "i",
        Key::KeyJ => "j",
        Key::KeyK => "k",
        Key::KeyL => "l",
        Key::KeyM => "m",
        Key::KeyN => "n",
        Key::KeyO => "o",
        Key::KeyP => "p",
        Key::KeyQ => "q",
        Key::KeyR => "r",
        Key::KeyS => "s",
        Key::KeyT => "t",
        Key::KeyU => "u",
        Key::KeyV => "v",
        Key::KeyW => "w",
        Key::KeyX => "x",
        Key::KeyY => "y",
        Key::KeyZ => "z",
        Key::Unknown(_) => "",
    }
}
