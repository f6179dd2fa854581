//! Medical report explanation and follow-up Q&A.

use thiserror::Error;
use tracing::{debug, info};

use crate::llm::{Conversation, ProviderKind};
use crate::prompts::{REPORT_FOLLOWUP_PROMPT, REPORT_PROMPT};
use crate::router::{RouteError, Router};

/// Report text beyond this many characters is dropped before sending.
pub const REPORT_CHAR_LIMIT: usize = 12_000;

/// Turns PDF bytes into plain text.
pub trait ReportExtractor: Send + Sync {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, ReportError>;
}

/// Extractor for digital PDFs with an embedded text layer.
pub struct PdfTextExtractor;

impl ReportExtractor for PdfTextExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<String, ReportError> {
        let pages = pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .map_err(|e| ReportError::Extraction(e.to_string()))?;
        debug!(pages = pages.len(), "Extracted report text");

        let mut text = String::new();
        for page in pages {
            text.push_str(&page);
            text.push('\n');
        }
        Ok(text)
    }
}

/// Keep at most [`REPORT_CHAR_LIMIT`] characters.
pub fn truncate_report(text: &str) -> &str {
    match text.char_indices().nth(REPORT_CHAR_LIMIT) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to extract report text: {0}")]
    Extraction(String),

    #[error("the report contains no extractable text")]
    EmptyReport,

    #[error("no report has been explained yet")]
    NotExplained,

    #[error(transparent)]
    Route(#[from] RouteError),
}

/// The Q&A conversation about one uploaded report.
#[derive(Debug, Default)]
pub struct ReportSession {
    report_id: Option<String>,
    conversation: Conversation,
}

impl ReportSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Whether the initial explanation exists.
    pub fn is_explained(&self) -> bool {
        self.conversation.len() >= 2
    }

    /// Bind the session to a report. A different report resets the
    /// conversation; returns whether that happened.
    pub fn load(&mut self, report_id: &str) -> bool {
        if self.report_id.as_deref() == Some(report_id) {
            return false;
        }
        info!(report = report_id, "Loaded new report");
        self.report_id = Some(report_id.to_string());
        self.conversation.clear();
        true
    }

    /// Ask for the initial explanation of `report_text`.
    ///
    /// On success the conversation becomes the report message plus the
    /// explanation; on failure it is left untouched.
    pub async fn explain(
        &mut self,
        router: &Router,
        provider: ProviderKind,
        report_text: &str,
    ) -> Result<String, ReportError> {
        let content = truncate_report(report_text).trim();
        if content.is_empty() {
            return Err(ReportError::EmptyReport);
        }

        let mut history = Conversation::new();
        history.push_user(format!("Here is the medical report content:\n\n{content}"));
        let explanation = router
            .respond(provider, REPORT_PROMPT, history.messages(), None)
            .await?;
        history.push_assistant(explanation.clone());
        self.conversation = history;
        Ok(explanation)
    }

    /// Ask a follow-up question about the explained report.
    pub async fn ask(
        &mut self,
        router: &Router,
        provider: ProviderKind,
        question: &str,
    ) -> Result<String, ReportError> {
        if !self.is_explained() {
            return Err(ReportError::NotExplained);
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(RouteError::InvalidRequest("question is empty").into());
        }

        self.conversation.push_user(question);
        self.answer(router, provider).await
    }

    /// Regenerate the latest follow-up answer.
    pub async fn retry(
        &mut self,
        router: &Router,
        provider: ProviderKind,
    ) -> Result<String, ReportError> {
        // The first exchange is regenerated through `explain`, not here.
        if self.conversation.len() < 3 {
            return Err(RouteError::InvalidRequest("no follow-up to retry").into());
        }
        self.conversation.discard_trailing_reply();
        self.answer(router, provider).await
    }

    async fn answer(
        &mut self,
        router: &Router,
        provider: ProviderKind,
    ) -> Result<String, ReportError> {
        let reply = router
            .respond(
                provider,
                REPORT_FOLLOWUP_PROMPT,
                self.conversation.messages(),
                None,
            )
            .await?;
        self.conversation.push_assistant(reply.clone());
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMError, Message, Role};
    use crate::testing::{ScriptedProvider, router_with};

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "é".repeat(REPORT_CHAR_LIMIT + 10);
        let truncated = truncate_report(&text);
        assert_eq!(truncated.chars().count(), REPORT_CHAR_LIMIT);

        assert_eq!(truncate_report("short"), "short");
    }

    /// Build a PDF with one Helvetica text line per page.
    fn make_test_pdf(pages: &[&str]) -> Vec<u8> {
        use lopdf::dictionary;
        use lopdf::{Document, Object, Stream};

        let mut doc = Document::with_version("1.4");
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let pages_id = doc.new_object_id();

        let mut kids: Vec<Object> = Vec::new();
        for text in pages {
            let content = format!("BT /F1 12 Tf 100 700 Td ({text}) Tj ET");
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn extracts_pages_in_order_joined_by_newlines() {
        let pdf = make_test_pdf(&["Hemoglobin", "Ferritin"]);
        let text = PdfTextExtractor.extract_text(&pdf).unwrap();

        let first = text.find("Hemoglobin").unwrap();
        let second = text.find("Ferritin").unwrap();
        assert!(first < second);
        assert!(text[first..second].contains('\n'));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let result = PdfTextExtractor.extract_text(b"not a pdf");
        assert!(matches!(result, Err(ReportError::Extraction(_))));
    }

    #[test]
    fn load_resets_only_for_a_new_report() {
        let mut session = ReportSession::new();
        assert!(session.load("a.pdf"));
        session.conversation.push_user("x");

        assert!(!session.load("a.pdf"));
        assert_eq!(session.conversation().len(), 1);

        assert!(session.load("b.pdf"));
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn explain_builds_initial_exchange() {
        let provider = ScriptedProvider::new(vec![Ok("Key findings: normal.".to_string())]);
        let router = router_with(ProviderKind::OpenAI, provider.clone());
        let mut session = ReportSession::new();
        session.load("labs.pdf");

        let explanation = session
            .explain(&router, ProviderKind::OpenAI, "Hemoglobin 13.5 g/dL\n")
            .await
            .unwrap();

        assert_eq!(explanation, "Key findings: normal.");
        let calls = provider.calls();
        assert_eq!(calls[0].system, REPORT_PROMPT);
        assert_eq!(
            calls[0].conversation,
            vec![Message::user(
                "Here is the medical report content:\n\nHemoglobin 13.5 g/dL"
            )]
        );
        assert!(session.is_explained());
        assert_eq!(session.conversation().messages()[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn explain_truncates_long_reports() {
        let provider = ScriptedProvider::new(vec![Ok("ok".to_string())]);
        let router = router_with(ProviderKind::Gemini, provider.clone());
        let mut session = ReportSession::new();

        let long = "x".repeat(REPORT_CHAR_LIMIT * 2);
        session
            .explain(&router, ProviderKind::Gemini, &long)
            .await
            .unwrap();

        let sent = &provider.calls()[0].conversation[0].content;
        let prefix = "Here is the medical report content:\n\n";
        assert_eq!(sent.len(), prefix.len() + REPORT_CHAR_LIMIT);
    }

    #[tokio::test]
    async fn explain_failure_leaves_conversation_empty() {
        let provider = ScriptedProvider::new(vec![Err(LLMError::RateLimit {
            retry_after: None,
            message: "Too Many Requests".to_string(),
        })]);
        let router = router_with(ProviderKind::Gemini, provider);
        let mut session = ReportSession::new();

        let err = session
            .explain(&router, ProviderKind::Gemini, "report")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReportError::Route(RouteError::RateLimited {
                provider: ProviderKind::Gemini
            })
        ));
        assert!(session.conversation().is_empty());
    }

    #[tokio::test]
    async fn blank_report_is_rejected() {
        let router = router_with(ProviderKind::OpenAI, ScriptedProvider::new(vec![]));
        let mut session = ReportSession::new();
        let err = session
            .explain(&router, ProviderKind::OpenAI, " \n\n ")
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::EmptyReport));
    }

    #[tokio::test]
    async fn follow_up_requires_explanation() {
        let router = router_with(ProviderKind::OpenAI, ScriptedProvider::new(vec![]));
        let mut session = ReportSession::new();
        let err = session
            .ask(&router, ProviderKind::OpenAI, "is this bad?")
            .await
            .unwrap_err();
        assert!(matches!(err, ReportError::NotExplained));
    }

    #[tokio::test]
    async fn follow_up_uses_followup_prompt_and_full_history() {
        let provider = ScriptedProvider::new(vec![
            Ok("Explained.".to_string()),
            Ok("Slightly low.".to_string()),
            Ok("Within range.".to_string()),
        ]);
        let router = router_with(ProviderKind::OpenAI, provider.clone());
        let mut session = ReportSession::new();

        session
            .explain(&router, ProviderKind::OpenAI, "Ferritin 12 ng/mL")
            .await
            .unwrap();
        session
            .ask(&router, ProviderKind::OpenAI, "What about ferritin?")
            .await
            .unwrap();
        let retried = session
            .retry(&router, ProviderKind::OpenAI)
            .await
            .unwrap();

        assert_eq!(retried, "Within range.");
        let calls = provider.calls();
        assert_eq!(calls[1].system, REPORT_FOLLOWUP_PROMPT);
        assert_eq!(calls[1].conversation.len(), 3);
        assert_eq!(calls[2].conversation, calls[1].conversation);
        assert_eq!(session.conversation().len(), 4);
    }
}
