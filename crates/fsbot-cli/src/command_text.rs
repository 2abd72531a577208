/// One line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Command { verb: String, args: Vec<String> },
    Confirm { token: String, accepted: bool },
    Quit,
    Blank,
}

pub const CONFIRM_USAGE: &str = "/confirm <token> <yes|no>";

/// Parses a console line. Lines not starting with `/` are rejected so that
/// stray text is never run as a command.
pub fn parse_console_line(input: &str) -> Result<ConsoleInput, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(ConsoleInput::Blank);
    }
    if !trimmed.starts_with('/') {
        return Err(format!(
            "commands start with '/': try /help (got '{trimmed}')"
        ));
    }

    let tokens = tokenize(trimmed)?;
    let Some((first, args)) = tokens.split_first() else {
        return Ok(ConsoleInput::Blank);
    };
    let verb = first.trim_start_matches('/').to_ascii_lowercase();
    match verb.as_str() {
        "quit" | "exit" => Ok(ConsoleInput::Quit),
        "confirm" => parse_confirmation(args),
        _ => Ok(ConsoleInput::Command {
            verb,
            args: args.to_vec(),
        }),
    }
}

fn parse_confirmation(tokens: &[String]) -> Result<ConsoleInput, String> {
    let [token, decision] = tokens else {
        return Err(format!("usage: {CONFIRM_USAGE}"));
    };
    let accepted = match decision.to_ascii_lowercase().as_str() {
        "yes" | "y" => true,
        "no" | "n" => false,
        _ => return Err(format!("usage: {CONFIRM_USAGE}")),
    };
    Ok(ConsoleInput::Confirm {
        token: token.clone(),
        accepted,
    })
}

/// Splits on whitespace; double or single quotes group a token, and a
/// backslash escapes the next character inside double quotes.
pub fn tokenize(input: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some('"'), '\\') => match chars.next() {
                Some(escaped) => current.push(escaped),
                None => return Err("dangling escape at end of input".to_string()),
            },
            (Some(open), ch) if ch == open => quote = None,
            (Some(_), ch) => current.push(ch),
            (None, '"' | '\'') => {
                quote = Some(ch);
                in_token = true;
            }
            (None, ch) if ch.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, ch) => {
                current.push(ch);
                in_token = true;
            }
        }
    }
    if quote.is_some() {
        return Err("unterminated quote".to_string());
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}
