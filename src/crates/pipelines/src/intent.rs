//! Keyword intent classification
//!
//! The rule set behind the model classifier's fallback path, and the mapping
//! from a classified intent to the model-selection task kind.

use models::TaskType;
use taskgraph_core::Intent;

/// Classify a query by keyword rules alone
///
/// Order matters: the more specific shapes (code, analysis, creative) are
/// checked before the generic question/request buckets.
pub fn classify_by_keywords(query: &str) -> Intent {
    let lower = query.to_lowercase();

    if ["code", "function", "bug", "compile", "script", "debug", "implement"]
        .iter()
        .any(|m| lower.contains(m))
    {
        return Intent::Code;
    }

    if ["analyze", "compare", "evaluate", "pros and cons", "trade-off"]
        .iter()
        .any(|m| lower.contains(m))
    {
        return Intent::Analysis;
    }

    if ["write a story", "write a poem", "poem", "story about", "imagine a"]
        .iter()
        .any(|m| lower.contains(m))
    {
        return Intent::Creative;
    }

    if ["can you", "could you", "please", "help me"]
        .iter()
        .any(|m| lower.contains(m))
    {
        return Intent::Request;
    }

    let question_openers = ["what", "who", "when", "where", "why", "how", "which"];
    if lower.contains('?') || question_openers.iter().any(|m| lower.starts_with(m)) {
        return Intent::Question;
    }

    Intent::Conversation
}

/// The model-selection task kind for a classified intent
pub fn task_type_for(intent: Intent) -> TaskType {
    match intent {
        Intent::Code => TaskType::CodeTasks,
        Intent::Analysis => TaskType::AnalyticalReasoning,
        Intent::Creative => TaskType::CreativeWriting,
        Intent::Conversation => TaskType::Conversation,
        Intent::Question | Intent::Request => TaskType::QaAndSummary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_greeting_is_conversation() {
        assert_eq!(classify_by_keywords("Hello"), Intent::Conversation);
        assert_eq!(classify_by_keywords("good morning"), Intent::Conversation);
    }

    #[test]
    fn test_code_keywords() {
        assert_eq!(
            classify_by_keywords("fix this bug in my script"),
            Intent::Code
        );
        assert_eq!(
            classify_by_keywords("implement a binary search"),
            Intent::Code
        );
    }

    #[test]
    fn test_analysis_keywords() {
        assert_eq!(
            classify_by_keywords("compare these two approaches"),
            Intent::Analysis
        );
    }

    #[test]
    fn test_creative_keywords() {
        assert_eq!(
            classify_by_keywords("write a story about a lighthouse"),
            Intent::Creative
        );
    }

    #[test]
    fn test_question_shapes() {
        assert_eq!(classify_by_keywords("what is entropy"), Intent::Question);
        assert_eq!(
            classify_by_keywords("is it raining in Lisbon?"),
            Intent::Question
        );
    }

    #[test]
    fn test_request_shape() {
        assert_eq!(
            classify_by_keywords("please summarize this article"),
            Intent::Request
        );
    }

    #[test]
    fn test_specific_beats_generic() {
        // Contains both a question opener and a code keyword
        assert_eq!(
            classify_by_keywords("how do I debug this?"),
            Intent::Code
        );
    }

    #[test]
    fn test_task_type_mapping() {
        assert_eq!(task_type_for(Intent::Code), TaskType::CodeTasks);
        assert_eq!(task_type_for(Intent::Question), TaskType::QaAndSummary);
        assert_eq!(task_type_for(Intent::Conversation), TaskType::Conversation);
    }
}
