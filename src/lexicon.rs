//! Morse lexicon and quick commands
//!
//! Two immutable tables, built on first use: the International Morse
//! alphabet (letters, digits, punctuation) and a small set of reserved
//! sequences that expand to whole emergency phrases. A quick command always
//! wins over the single-character lookup of the same sequence.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Appended for sequences that match neither table
pub const PLACEHOLDER: char = '?';

const MORSE_TABLE: &[(&str, char)] = &[
    (".-", 'A'),
    ("-...", 'B'),
    ("-.-.", 'C'),
    ("-..", 'D'),
    (".", 'E'),
    ("..-.", 'F'),
    ("--.", 'G'),
    ("....", 'H'),
    ("..", 'I'),
    (".---", 'J'),
    ("-.-", 'K'),
    (".-..", 'L'),
    ("--", 'M'),
    ("-.", 'N'),
    ("---", 'O'),
    (".--.", 'P'),
    ("--.-", 'Q'),
    (".-.", 'R'),
    ("...", 'S'),
    ("-", 'T'),
    ("..-", 'U'),
    ("...-", 'V'),
    (".--", 'W'),
    ("-..-", 'X'),
    ("-.--", 'Y'),
    ("--..", 'Z'),
    ("-----", '0'),
    (".----", '1'),
    ("..---", '2'),
    ("...--", '3'),
    ("....-", '4'),
    (".....", '5'),
    ("-....", '6'),
    ("--...", '7'),
    ("---..", '8'),
    ("----.", '9'),
    (".-.-.-", '.'),
    ("--..--", ','),
    ("..--..", '?'),
    (".----.", '\''),
    ("-.-.--", '!'),
    ("-..-.", '/'),
    ("-.--.", '('),
    ("-.--.-", ')'),
    (".-..-.", '"'),
    ("---...", ':'),
    ("-.-.-.", ';'),
    ("-...-", '='),
    (".-.-.", '+'),
    ("-....-", '-'),
    ("..--.-", '_'),
    (".--.-.", '@'),
];

const QUICK_COMMAND_TABLE: &[(&str, &str)] = &[
    ("...---...", "HELP! EMERGENCY!"),
    ("..--.", "I need water"),
    ("--..--", "Call the nurse"),
    (".-.-", "I am in pain"),
    ("..--", "Thank you"),
    ("---...---", "I need medication"),
];

fn morse_map() -> &'static HashMap<&'static str, char> {
    static MAP: OnceLock<HashMap<&'static str, char>> = OnceLock::new();
    MAP.get_or_init(|| MORSE_TABLE.iter().copied().collect())
}

fn quick_command_map() -> &'static HashMap<&'static str, &'static str> {
    static MAP: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    MAP.get_or_init(|| QUICK_COMMAND_TABLE.iter().copied().collect())
}

/// Single-character lookup
pub fn lookup(sequence: &str) -> Option<char> {
    morse_map().get(sequence).copied()
}

/// Quick-command phrase for an exact sequence
pub fn quick_command(sequence: &str) -> Option<&'static str> {
    quick_command_map().get(sequence).copied()
}

/// What a finished letter turns into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Phrase(&'static str),
    Char(char),
    Unknown,
}

/// Resolve a complete buffered sequence, quick commands first
pub fn decode(sequence: &str) -> Decoded {
    if let Some(phrase) = quick_command(sequence) {
        return Decoded::Phrase(phrase);
    }
    match lookup(sequence) {
        Some(c) => Decoded::Char(c),
        None => Decoded::Unknown,
    }
}

/// Morse alphabet entries in table order
pub fn morse_entries() -> &'static [(&'static str, char)] {
    MORSE_TABLE
}

/// Quick-command entries in table order
pub fn quick_command_entries() -> &'static [(&'static str, &'static str)] {
    QUICK_COMMAND_TABLE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_letters_and_digits() {
        assert_eq!(lookup("..."), Some('S'));
        assert_eq!(lookup("---"), Some('O'));
        assert_eq!(lookup("-----"), Some('0'));
        assert_eq!(lookup(".--.-."), Some('@'));
        assert_eq!(lookup("........"), None);
        assert_eq!(lookup(""), None);
    }

    #[test]
    fn test_quick_command_takes_priority() {
        // "--..--" is both ',' and a quick command
        assert_eq!(lookup("--..--"), Some(','));
        assert_eq!(decode("--..--"), Decoded::Phrase("Call the nurse"));
        assert_eq!(decode("...---..."), Decoded::Phrase("HELP! EMERGENCY!"));
        assert_eq!(decode(".-"), Decoded::Char('A'));
        assert_eq!(decode(".-.-.-.-.-"), Decoded::Unknown);
    }

    #[test]
    fn test_tables_have_unique_keys() {
        let keys: HashSet<_> = morse_entries().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys.len(), morse_entries().len());
        let keys: HashSet<_> = quick_command_entries().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys.len(), quick_command_entries().len());
    }

    #[test]
    fn test_tables_only_use_dots_and_dashes() {
        let all = morse_entries()
            .iter()
            .map(|(k, _)| *k)
            .chain(quick_command_entries().iter().map(|(k, _)| *k));
        for key in all {
            assert!(key.chars().all(|c| c == '.' || c == '-'), "bad key {key}");
        }
    }
}
