use std::sync::Arc;

use tokio::sync::watch;

use crate::db::types::TranscriptTurn;
use crate::services::ai_generation::AiGenerationClient;
use crate::services::errors::GradingError;
use crate::services::grade_extraction::{ExtractedGrade, ExtractionPolicy, GradeExtractor};
use crate::services::prompts;
use crate::services::rubric::Rubric;

/// Everything the AI needs to look at for one attempt.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GradingRequest<'a> {
    pub(crate) question: &'a str,
    pub(crate) transcript: &'a [TranscriptTurn],
    pub(crate) rubric: &'a Rubric,
}

/// Independent result slots; one failing half never hides the other.
#[derive(Debug)]
pub(crate) struct FeedbackAndGrade {
    pub(crate) feedback: Result<String, GradingError>,
    pub(crate) grade: Result<ExtractedGrade, GradingError>,
}

#[derive(Clone)]
pub(crate) struct GradingOrchestrator {
    client: Arc<dyn AiGenerationClient>,
    policy: ExtractionPolicy,
}

impl GradingOrchestrator {
    pub(crate) fn new(client: Arc<dyn AiGenerationClient>, policy: ExtractionPolicy) -> Self {
        Self { client, policy }
    }

    /// Single call, no retry. The reply is returned as-is.
    pub(crate) async fn generate_feedback(
        &self,
        request: GradingRequest<'_>,
    ) -> Result<String, GradingError> {
        request.rubric.validate()?;
        self.feedback_for(request).await
    }

    pub(crate) async fn generate_grade(
        &self,
        request: GradingRequest<'_>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<ExtractedGrade, GradingError> {
        request.rubric.validate()?;
        self.grade_for(request, cancel).await
    }

    /// Runs feedback and grading concurrently. Only a rubric schema failure
    /// fails the whole call; everything else lands in its own slot.
    pub(crate) async fn generate_feedback_and_grade(
        &self,
        request: GradingRequest<'_>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<FeedbackAndGrade, GradingError> {
        request.rubric.validate()?;

        let (feedback, grade) =
            tokio::join!(self.feedback_for(request), self.grade_for(request, cancel));

        if let Err(err) = &feedback {
            tracing::warn!(error = %err, kind = err.kind(), "Feedback generation failed");
        }
        if let Err(err) = &grade {
            tracing::warn!(error = %err, kind = err.kind(), "Grade generation failed");
        }

        Ok(FeedbackAndGrade { feedback, grade })
    }

    async fn feedback_for(&self, request: GradingRequest<'_>) -> Result<String, GradingError> {
        let prompt = prompts::feedback_prompt(request.question, request.transcript, request.rubric);
        Ok(self.client.generate(&prompt).await?)
    }

    async fn grade_for(
        &self,
        request: GradingRequest<'_>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<ExtractedGrade, GradingError> {
        if !prompts::has_student_response(request.transcript) {
            tracing::info!(rubric_id = %request.rubric.id(), "No student response; grading as 0%");
            return Ok(ExtractedGrade::from_digits("0"));
        }

        let prompt = prompts::grade_prompt(request.question, request.transcript, request.rubric);
        GradeExtractor::new(self.client.as_ref(), self.policy).run(&prompt, cancel).await
    }
}
