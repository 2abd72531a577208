#![no_main]

use fsbot_cli::command_text::{parse_console_line, tokenize, ConsoleInput};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Ok(tokens) = tokenize(&raw) {
        assert!(tokens.len() <= raw.len());
    }
    match parse_console_line(&raw) {
        Ok(ConsoleInput::Command { verb, .. }) => {
            assert!(!verb.starts_with('/'));
            assert_eq!(verb, verb.to_ascii_lowercase());
        }
        Ok(ConsoleInput::Confirm { .. }) => assert!(raw.trim_start().starts_with('/')),
        Ok(ConsoleInput::Quit) | Ok(ConsoleInput::Blank) => {}
        Err(message) => assert!(!message.is_empty()),
    }
});
