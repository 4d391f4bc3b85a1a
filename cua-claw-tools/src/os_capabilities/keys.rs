//! Translation of service key names into wtype arguments.
//!
//! The service names keys the way a browser automation layer would
//! ("CTRL", "ENTER", "ArrowLeft"); wtype wants xkb modifier names for
//! `-M`/`-m` and keysym names for `-k`.

use super::{OsError, OsResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyToken {
    Modifier(&'static str),
    Key(String),
}

fn validate_key_token(key: &str) -> OsResult<()> {
    if key.trim().is_empty() {
        return Err(OsError::InvalidArgument("key cannot be empty".to_string()));
    }
    if !key.chars().all(|ch| ch.is_ascii_graphic() || ch == ' ') {
        return Err(OsError::InvalidArgument(format!(
            "key contains invalid characters: {key:?}"
        )));
    }
    Ok(())
}

/// Classify one key name.
pub fn key_token(raw: &str) -> OsResult<KeyToken> {
    validate_key_token(raw)?;
    let lower = raw.trim().to_lowercase();

    let modifier = match lower.as_str() {
        "ctrl" | "control" => Some("ctrl"),
        "alt" | "option" => Some("alt"),
        "shift" => Some("shift"),
        "cmd" | "meta" | "super" | "win" | "logo" => Some("logo"),
        _ => None,
    };
    if let Some(name) = modifier {
        return Ok(KeyToken::Modifier(name));
    }

    let keysym = match lower.as_str() {
        "enter" | "return" => "Return",
        "esc" | "escape" => "Escape",
        "tab" => "Tab",
        "space" => "space",
        "backspace" => "BackSpace",
        "delete" | "del" => "Delete",
        "insert" => "Insert",
        "home" => "Home",
        "end" => "End",
        "pageup" | "page_up" => "Prior",
        "pagedown" | "page_down" => "Next",
        "up" | "arrowup" => "Up",
        "down" | "arrowdown" => "Down",
        "left" | "arrowleft" => "Left",
        "right" | "arrowright" => "Right",
        "capslock" => "Caps_Lock",
        "/" | "slash" => "slash",
        "\\" | "backslash" => "backslash",
        "-" | "minus" => "minus",
        "=" | "equal" => "equal",
        "." | "period" => "period",
        "," | "comma" => "comma",
        _ => "",
    };
    if !keysym.is_empty() {
        return Ok(KeyToken::Key(keysym.to_string()));
    }

    if let Some(number) = lower.strip_prefix('f') {
        if number.parse::<u8>().is_ok_and(|n| (1..=24).contains(&n)) {
            return Ok(KeyToken::Key(lower.to_uppercase()));
        }
    }

    let raw = raw.trim();
    if raw.chars().count() == 1 {
        return Ok(KeyToken::Key(raw.to_string()));
    }

    Err(OsError::InvalidArgument(format!("unknown key: {raw}")))
}

/// Build the wtype argument vector for a key chord.
///
/// Modifiers are held with `-M`, the remaining keys are tapped with `-k`,
/// and the modifiers are released in reverse order.
///
/// # Errors
/// Returns `InvalidArgument` for empty chords, unknown key names, or a
/// chord made only of modifiers.
pub fn wtype_args(keys: &[String]) -> OsResult<Vec<String>> {
    if keys.is_empty() {
        return Err(OsError::InvalidArgument("no keys given".to_string()));
    }

    let mut modifiers = Vec::new();
    let mut taps = Vec::new();
    for key in keys {
        match key_token(key)? {
            KeyToken::Modifier(name) => modifiers.push(name),
            KeyToken::Key(sym) => taps.push(sym),
        }
    }

    if taps.is_empty() {
        // A lone modifier press: tap it as a key.
        return Ok(modifiers
            .iter()
            .flat_map(|m| ["-M".to_string(), m.to_string(), "-m".to_string(), m.to_string()])
            .collect());
    }

    let held = !modifiers.is_empty();
    let mut args = Vec::new();
    for modifier in &modifiers {
        args.push("-M".to_string());
        args.push(modifier.to_string());
    }
    for sym in taps {
        args.push("-k".to_string());
        // With a modifier held, letters must be the unshifted keysym.
        if held && sym.chars().count() == 1 {
            args.push(sym.to_lowercase());
        } else {
            args.push(sym);
        }
    }
    for modifier in modifiers.iter().rev() {
        args.push("-m".to_string());
        args.push(modifier.to_string());
    }
    Ok(args)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_named_keys_map_to_keysyms() {
        assert_eq!(key_token("ENTER").unwrap(), KeyToken::Key("Return".to_string()));
        assert_eq!(key_token("ArrowLeft").unwrap(), KeyToken::Key("Left".to_string()));
        assert_eq!(key_token("PageDown").unwrap(), KeyToken::Key("Next".to_string()));
        assert_eq!(key_token("f5").unwrap(), KeyToken::Key("F5".to_string()));
        assert_eq!(key_token("CMD").unwrap(), KeyToken::Modifier("logo"));
    }

    #[test]
    fn test_chord_holds_and_releases_modifiers() {
        let args = wtype_args(&keys(&["CTRL", "SHIFT", "T"])).unwrap();
        assert_eq!(
            args,
            keys(&["-M", "ctrl", "-M", "shift", "-k", "t", "-m", "shift", "-m", "ctrl"])
        );
    }

    #[test]
    fn test_single_key_is_tapped() {
        assert_eq!(wtype_args(&keys(&["Enter"])).unwrap(), keys(&["-k", "Return"]));
        assert_eq!(wtype_args(&keys(&["A"])).unwrap(), keys(&["-k", "A"]));
    }

    #[test]
    fn test_rejects_unknown_and_empty_keys() {
        assert!(wtype_args(&[]).is_err());
        assert!(wtype_args(&keys(&["hyperdrive"])).is_err());
        assert!(wtype_args(&keys(&[""])).is_err());
        assert!(wtype_args(&keys(&["a\nb"])).is_err());
    }
}
