//! Prompt assembly for grounded answers.

use rag_shared::{Passage, Question};

pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions \
using only the provided context. If the context does not contain the answer, say \
that you don't know. Keep answers concise.";

/// User prompt: numbered context passages followed by the question.
pub fn build_prompt(question: &Question, contexts: &[Passage]) -> String {
    let mut prompt = String::from("Context:\n");
    if contexts.is_empty() {
        prompt.push_str("(no relevant documents found)\n");
    }
    for (i, passage) in contexts.iter().enumerate() {
        match passage.source() {
            Some(source) => prompt.push_str(&format!("[{}] ({})\n", i + 1, source)),
            None => prompt.push_str(&format!("[{}]\n", i + 1)),
        }
        prompt.push_str(passage.content.trim());
        prompt.push_str("\n\n");
    }
    prompt.push_str(&format!("Question: {}\nAnswer:", question.as_str().trim()));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_numbers_passages_in_order() {
        let q = Question::new("What is the capital of France?").unwrap();
        let contexts = vec![
            Passage::new("Paris is the capital of France."),
            Passage::new("France is in Europe."),
        ];
        let prompt = build_prompt(&q, &contexts);
        let first = prompt.find("[1]").unwrap();
        let second = prompt.find("[2]").unwrap();
        assert!(first < second);
        assert!(prompt.contains("Paris is the capital of France."));
        assert!(prompt.ends_with("Question: What is the capital of France?\nAnswer:"));
    }

    #[test]
    fn test_prompt_without_context() {
        let q = Question::new("Anything?").unwrap();
        assert!(build_prompt(&q, &[]).contains("no relevant documents"));
    }
}
