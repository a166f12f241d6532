//! Ordered message history of one question.

use super::prompt::{trailing_instructions, user_prompt};
use crate::llm::ChatMessage;

/// System block, question, trailing instructions, then the scratchpad of
/// intermediate steps.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    attempts: u32,
}

impl Conversation {
    pub fn new(system: String, question: &str) -> Self {
        Self {
            messages: vec![
                ChatMessage::system(system),
                ChatMessage::user(user_prompt(question)),
                ChatMessage::user(trailing_instructions()),
            ],
            attempts: 0,
        }
    }

    /// Record a failed step and the observation the model should react to.
    pub fn record_attempt(&mut self, reply: &str, observation: String) {
        self.messages.push(ChatMessage::assistant(reply));
        self.messages.push(ChatMessage::user(observation));
        self.attempts += 1;
    }

    /// Record the successful step and the final-answer instruction.
    pub fn record_result(&mut self, reply: &str, answer_prompt: String) {
        self.messages.push(ChatMessage::assistant(reply));
        self.messages.push(ChatMessage::user(answer_prompt));
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Failed steps so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn test_initial_order() {
        let conv = Conversation::new("system".to_string(), "top 5 vendors");
        let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::User]);
        assert_eq!(conv.messages()[1].content, "Now answer this query: top 5 vendors");
        assert_eq!(conv.attempts(), 0);
    }

    #[test]
    fn test_scratchpad_grows_in_pairs() {
        let mut conv = Conversation::new("system".to_string(), "q");
        conv.record_attempt("```sql\nDROP TABLE x\n```", "not allowed".to_string());
        conv.record_result("```sql\nSELECT 1\n```", "answer it".to_string());

        let messages = conv.messages();
        assert_eq!(messages.len(), 7);
        assert_eq!(messages[3].role, Role::Assistant);
        assert_eq!(messages[4].content, "not allowed");
        assert_eq!(messages[6].content, "answer it");
        assert_eq!(conv.attempts(), 1);
    }
}
