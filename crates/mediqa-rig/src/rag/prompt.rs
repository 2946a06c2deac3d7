//! Prompt assembly for grounded answering.

use serde::{Deserialize, Serialize};

use super::RetrievalResult;

/// System instruction sent with every question.
pub const SYSTEM_PROMPT: &str = "\
Using the information contained in the context,
give a comprehensive answer to the question.
Respond only to the question asked, response should be concise and relevant to the question.
Provide the number of the source document when relevant.
If the answer cannot be deduced from the context, do not give an answer.";

/// User block with `{context}` and `{question}` slots.
pub const USER_PROMPT: &str = "\
Context:
{context}
---
Now here is the question you need to answer.

Question: {question}";

/// A rendered prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// System instruction.
    pub system: String,
    /// User block holding the documents and the question.
    pub user: String,
}

impl Prompt {
    /// Returns the system instruction and user block as one string.
    pub fn text(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

/// Template turning a question and its retrieved documents into a [`Prompt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    system: String,
    user: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(SYSTEM_PROMPT, USER_PROMPT)
    }
}

impl PromptTemplate {
    /// Creates a template from a system instruction and a user block.
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Formats retrieved documents as numbered context lines, in rank order.
    pub fn format_context(retrieval: &RetrievalResult) -> String {
        let mut context = String::from("\nExtracted documents:\n");
        for (i, document) in retrieval.documents.iter().enumerate() {
            context.push_str(&format!("Document {i}:::{}\n", document.text));
        }
        context
    }

    /// Renders the prompt for one question.
    pub fn render(&self, question: &str, retrieval: &RetrievalResult) -> Prompt {
        let context = Self::format_context(retrieval);
        Prompt {
            system: self.system.clone(),
            user: fill(&self.user, &context, question),
        }
    }
}

/// Substitutes both slots in a single pass, so slot-like text inside the
/// documents or the question is left alone.
fn fill(template: &str, context: &str, question: &str) -> String {
    let mut out = String::with_capacity(template.len() + context.len() + question.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];

        if let Some(after) = tail.strip_prefix("{context}") {
            out.push_str(context);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{question}") {
            out.push_str(question);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::RetrievedDocument;

    fn retrieval(texts: &[&str]) -> RetrievalResult {
        RetrievalResult {
            query: "Q".into(),
            documents: texts
                .iter()
                .enumerate()
                .map(|(rank, text)| RetrievedDocument {
                    rank,
                    id: format!("id-{rank}"),
                    text: (*text).to_owned(),
                    title: String::new(),
                    source: String::new(),
                    score: 1.0 - rank as f32 * 0.1,
                })
                .collect(),
        }
    }

    #[test]
    fn documents_are_numbered_in_rank_order() {
        let prompt = PromptTemplate::default().render("Q", &retrieval(&["A", "B"]));
        let text = prompt.text();

        let first = text.find("Document 0:::A").unwrap();
        let second = text.find("Document 1:::B").unwrap();
        assert!(first < second);
        assert!(text.ends_with("Q"));
        assert!(text.starts_with(SYSTEM_PROMPT));
    }

    #[test]
    fn empty_retrieval_keeps_header() {
        let prompt = PromptTemplate::default().render("What is aspirin?", &retrieval(&[]));
        assert!(prompt.user.contains("Extracted documents:"));
        assert!(!prompt.user.contains("Document 0"));
        assert!(prompt.user.ends_with("Question: What is aspirin?"));
    }

    #[test]
    fn slot_text_in_inputs_is_not_expanded() {
        let prompt = PromptTemplate::default().render("{context}?", &retrieval(&["{question}"]));
        assert!(prompt.user.contains("Document 0:::{question}"));
        assert!(prompt.user.ends_with("Question: {context}?"));
    }
}
