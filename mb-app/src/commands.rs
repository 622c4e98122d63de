//! Slash-command parsing.

use mb_telegram::Message;

/// Built-in commands. Platform names that collide with these never become
/// dynamic commands.
pub const RESERVED_COMMANDS: [&str; 11] = [
    "start",
    "music",
    "netease",
    "program",
    "search",
    "lyric",
    "recognize",
    "about",
    "status",
    "settings",
    "rmcache",
];

pub fn is_reserved_command(name: &str) -> bool {
    RESERVED_COMMANDS.contains(&name)
}

/// Splits `/verb rest` at the first whitespace run. `None` for non-commands.
fn split_command(text: &str) -> Option<(&str, &str)> {
    let body = text.strip_prefix('/')?;
    match body.split_once(char::is_whitespace) {
        Some((verb, rest)) => Some((verb, rest.trim())),
        None => Some((body, "")),
    }
}

/// Argument remainder of a command, trimmed at both ends. Whitespace between
/// arguments is kept as-is.
pub fn command_arguments(text: &str) -> &str {
    split_command(text).map(|(_, args)| args).unwrap_or_default()
}

/// Command verb with any `@botname` suffix removed.
pub fn base_command(text: &str) -> Option<&str> {
    let (verb, _) = split_command(text)?;
    let verb = verb.split_once('@').map_or(verb, |(name, _)| name);
    (!verb.is_empty()).then_some(verb)
}

/// Command verb addressed to this bot: bare `/verb`, or `/verb@bot_name` when
/// `bot_name` is known. Commands addressed to other bots yield `None`.
pub fn addressed_command<'a>(text: &'a str, bot_name: &str) -> Option<&'a str> {
    let (verb, _) = split_command(text)?;
    match verb.split_once('@') {
        None if !verb.is_empty() => Some(verb),
        Some((name, target)) if !bot_name.is_empty() && target == bot_name && !name.is_empty() => {
            Some(name)
        }
        _ => None,
    }
}

/// Exact, case-sensitive match of `cmd` or `cmd@bot_name`.
pub fn matches_command(text: &str, bot_name: &str, cmd: &str) -> bool {
    let Some((verb, _)) = split_command(text) else {
        return false;
    };
    if verb == cmd {
        return true;
    }
    !bot_name.is_empty()
        && verb
            .strip_prefix(cmd)
            .and_then(|rest| rest.strip_prefix('@'))
            .is_some_and(|target| target == bot_name)
}

/// True when the transport marked a `bot_command` entity at offset 0.
pub fn is_command_message(message: &Message) -> bool {
    message.text().starts_with('/')
        && message
            .entities
            .iter()
            .any(|entity| entity.kind == "bot_command" && entity.offset == 0)
}
