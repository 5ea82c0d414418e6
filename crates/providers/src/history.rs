//! Transcript replay rules shared by the provider adapters.
//!
//! Saved sessions drop tool records by default, which leaves AI messages whose
//! tool calls have no answer. Vendors reject such histories, so an AI message
//! is replayed with its tool calls only when every call is answered by a tool
//! record later in the transcript. Everything else is replayed as plain text.

use std::collections::HashSet;

use snello_core::Message;

/// Call IDs whose requesting AI message can be replayed as a structured call.
pub(crate) fn replayable_call_ids(messages: &[Message]) -> HashSet<&str> {
    let mut replayable = HashSet::new();

    for (idx, message) in messages.iter().enumerate() {
        let calls = message.tool_calls();
        if calls.is_empty() {
            continue;
        }

        let answered: HashSet<&str> = messages[idx + 1..]
            .iter()
            .filter_map(|m| match m {
                Message::Tool(result) => Some(result.call_id.as_str()),
                _ => None,
            })
            .collect();

        if calls.iter().all(|c| answered.contains(c.id.as_str())) {
            replayable.extend(calls.iter().map(|c| c.id.as_str()));
        }
    }

    replayable
}
