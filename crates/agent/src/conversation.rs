//! Bounded dialogue history
//!
//! Holds the `{role, text}` turns handed to the language model. Entries are
//! only ever added as a completed user/assistant pair, and the oldest
//! entries are dropped so the history never exceeds its cap.

use std::collections::VecDeque;

use voice_call_core::Turn;

#[derive(Debug, Clone)]
pub struct ConversationState {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl ConversationState {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns + 2),
            max_turns,
        }
    }

    /// Record a completed exchange, user turn first
    pub fn append_exchange(&mut self, user_text: impl Into<String>, reply: impl Into<String>) {
        self.turns.push_back(Turn::user(user_text));
        self.turns.push_back(Turn::assistant(reply));

        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    /// Ordered snapshot for a model request
    pub fn turns(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(voice_call_config::constants::conversation::MAX_HISTORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voice_call_core::TurnRole;

    #[test]
    fn test_pairs_are_ordered() {
        let mut conversation = ConversationState::default();
        conversation.append_exchange("hi", "hello!");

        let turns = conversation.turns();
        assert_eq!(turns, vec![Turn::user("hi"), Turn::assistant("hello!")]);
    }

    #[test]
    fn test_history_is_capped() {
        let mut conversation = ConversationState::new(20);
        for i in 0..11 {
            conversation.append_exchange(format!("question {i}"), format!("answer {i}"));
        }

        assert_eq!(conversation.len(), 20);
        let turns = conversation.turns();
        assert_eq!(turns[0], Turn::user("question 1"));
        assert_eq!(turns[19], Turn::assistant("answer 10"));
        assert!(turns.iter().all(|t| t.text != "question 0" && t.text != "answer 0"));
    }

    #[test]
    fn test_roles_alternate_after_trimming() {
        let mut conversation = ConversationState::new(4);
        for i in 0..5 {
            conversation.append_exchange(format!("u{i}"), format!("a{i}"));
        }
        let roles: Vec<_> = conversation.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![TurnRole::User, TurnRole::Assistant, TurnRole::User, TurnRole::Assistant]
        );
    }

    #[test]
    fn test_odd_cap_keeps_latest_entries() {
        let mut conversation = ConversationState::new(3);
        conversation.append_exchange("u0", "a0");
        conversation.append_exchange("u1", "a1");
        assert_eq!(conversation.len(), 3);
        assert_eq!(conversation.turns()[0], Turn::assistant("a0"));
    }
}
