//! Quality override extraction from message text.

use crate::commands::{command_arguments, is_command_message};
use mb_platform::Quality;
use mb_telegram::Message;

/// Third argument of a `<platform> <id> <quality>` command, canonical names
/// only.
pub fn quality_from_command_args(args: &str) -> Option<Quality> {
    args.split_whitespace()
        .nth(2)
        .and_then(Quality::from_canonical)
}

/// Trailing token of free text; also accepts the `high`/`low` synonyms.
pub fn quality_from_text(text: &str) -> Option<Quality> {
    text.split_whitespace()
        .next_back()
        .and_then(Quality::from_free_text)
}

/// Quality override carried by `message`, using the command grammar for
/// commands and the free-text grammar otherwise.
pub fn extract_quality(message: Option<&Message>) -> Option<Quality> {
    let message = message?;
    let text = message.text().trim();
    if text.is_empty() {
        return None;
    }
    if is_command_message(message) {
        return quality_from_command_args(command_arguments(text));
    }
    quality_from_text(text)
}
