//! System prompts and greeting templates for the voice agent

use crate::config::AgentConfig;
use chrono::{Datelike, Local, NaiveDateTime};

/// Contextual information block; `{current_datetime}` and
/// `{current_location}` are filled in by [`build_system_prompt`]
pub const CONTEXT_PROMPT: &str = r#"
### Contextual information available to you:
- Current datetime: {current_datetime}
- Current location: {current_location}
- You can reference these naturally in conversation when relevant
"#;

/// Restrictions for replies that are spoken over the phone
pub const VOICE_RESTRICTION_PROMPT: &str = r#"
### IMPORTANT: Voice/Phone Context
Your responses will be said out loud over the phone. Therefore:
- Do NOT use emojis or any special characters
- Do NOT use formatting like asterisks, newlines, bold, italics, bullet points, em-dash, etc.
- You are ONLY allowed to use alphanumeric characters, spaces, punctuation, and commas.
- Spell out all units, dates, years, and abbreviations
- Use as few words as possible to get your point across. Be efficient with your word choice and sentence structure to reduce the total amount of words per response
- Speak naturally as if you're having a phone conversation
"#;

/// Instruction for models that end the call by saying the sentinel text
pub const GOODBYE_PROMPT: &str = r#"
### End Call Prompt
When the user indicates they want to end the call or when the conversation has reached a natural conclusion, you should respond with a message ending with "Goodbye!" to end the call.
"#;

/// Text that marks the end of the call in goodbye-prompt mode
pub const GOODBYE_SENTINEL: &str = "Goodbye!";

/// Ordinal suffix for a day of the month
pub fn ordinal_suffix(day: u32) -> &'static str {
    if (10..=20).contains(&(day % 100)) {
        return "th";
    }

    match day % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// Date for speech, e.g. "Saturday, May 19th"
pub fn format_speech_date(now: &NaiveDateTime) -> String {
    let day = now.day();
    format!("{} {}{}", now.format("%A, %B"), day, ordinal_suffix(day))
}

/// Date and time for speech, e.g. "Saturday, May 19th 10:20 A.M."
pub fn format_speech_datetime(now: &NaiveDateTime) -> String {
    let time = now
        .format("%I:%M %p")
        .to_string()
        .replace("AM", "A.M.")
        .replace("PM", "P.M.");
    let time = time.strip_prefix('0').unwrap_or(&time);

    format!("{} {}", format_speech_date(now), time)
}

/// Build the full system prompt
///
/// The goodbye block is only appended for models that end calls through the
/// "Goodbye!" sentinel instead of the end-call tool.
pub fn build_system_prompt(config: &AgentConfig, now: &NaiveDateTime) -> String {
    let context = CONTEXT_PROMPT
        .replace("{current_datetime}", &format_speech_datetime(now))
        .replace("{current_location}", &config.location);

    let goodbye = if config.uses_goodbye_prompt() {
        GOODBYE_PROMPT
    } else {
        ""
    };

    format!(
        "{}\n\n{}\n{}\n\n{}",
        config.agent_prompt, context, VOICE_RESTRICTION_PROMPT, goodbye
    )
}

/// Build the greeting spoken when the call starts
///
/// Returns `None` when no greeting (or an empty one) is configured.
pub fn build_initial_message(config: &AgentConfig, now: &NaiveDateTime) -> Option<String> {
    let template = config.initial_message.as_deref()?;
    if template.trim().is_empty() {
        return None;
    }

    Some(
        template
            .replace("{current_date}", &format_speech_date(now))
            .replace("{current_location}", &config.location),
    )
}

/// [`build_system_prompt`] against the local wall clock
pub fn system_prompt_now(config: &AgentConfig) -> String {
    build_system_prompt(config, &Local::now().naive_local())
}

/// [`build_initial_message`] against the local wall clock
pub fn initial_message_now(config: &AgentConfig) -> Option<String> {
    build_initial_message(config, &Local::now().naive_local())
}
