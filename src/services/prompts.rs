use std::fmt::Write as _;

use crate::db::types::{Sender, TranscriptTurn};
use crate::services::ai_generation::{Prompt, PromptKind};
use crate::services::rubric::Rubric;

const FEEDBACK_SYSTEM_PROMPT: &str = r#"You are an experienced examiner reviewing a student's oral-response session.
Read the question, the full transcript and the rubric, then write constructive feedback
addressed to the student.

For every rubric criterion:
- say which grading descriptor the answers match best and why,
- quote or paraphrase the part of the transcript that supports your judgement,
- suggest one concrete way to improve.

Finish with a short overall summary. Do not assign a numeric grade.
"#;

const GRADE_SYSTEM_PROMPT: &str = r#"You are an experienced examiner grading a student's oral-response session
against a weighted rubric.

Grading procedure:
1. For each criterion, pick the grading descriptor that best matches the student's answers
   and assign a sub-score out of that criterion's maximum.
2. Weighted score = (sub-score / maximum) x weightage, rounded to two decimal places.
3. Sum the weighted scores of all criteria and express the sum as a percentage of the
   maximum possible weighted total.

Special cases:
- If the student gave no answer, answered off-topic, or only gave single-word replies
  without elaboration, score the affected criteria as 0.
- If every criterion is affected, the final grade is 0%.

Show your working per criterion. The LAST line of your reply MUST have exactly this shape,
with a whole number and nothing after it:
Total Grade: <integer>%
"#;

const DEGENERATE_NOTE: &str = "Note: every student reply in this session is a single word with no \
elaboration. Treat the replies as degenerate when applying the special cases.";

pub(crate) fn feedback_prompt(question: &str, transcript: &[TranscriptTurn], rubric: &Rubric) -> Prompt {
    Prompt {
        kind: PromptKind::Feedback,
        system: FEEDBACK_SYSTEM_PROMPT.to_string(),
        user: session_body(question, transcript, rubric),
    }
}

pub(crate) fn grade_prompt(question: &str, transcript: &[TranscriptTurn], rubric: &Rubric) -> Prompt {
    let mut user = session_body(question, transcript, rubric);
    if is_degenerate(transcript) {
        user.push('\n');
        user.push_str(DEGENERATE_NOTE);
        user.push('\n');
    }
    user.push_str("\nEnd your reply with the line `Total Grade: <integer>%`.\n");

    Prompt { kind: PromptKind::Grade, system: GRADE_SYSTEM_PROMPT.to_string(), user }
}

/// True when the student said anything at all.
pub(crate) fn has_student_response(transcript: &[TranscriptTurn]) -> bool {
    student_replies(transcript).next().is_some()
}

/// True when every student reply is a single word.
pub(crate) fn is_degenerate(transcript: &[TranscriptTurn]) -> bool {
    let mut replies = student_replies(transcript).peekable();
    replies.peek().is_some() && replies.all(|text| text.split_whitespace().count() <= 1)
}

fn student_replies(transcript: &[TranscriptTurn]) -> impl Iterator<Item = &str> {
    transcript
        .iter()
        .filter(|turn| turn.sender == Sender::User)
        .map(|turn| turn.text.trim())
        .filter(|text| !text.is_empty())
}

fn session_body(question: &str, transcript: &[TranscriptTurn], rubric: &Rubric) -> String {
    format!(
        "Question:\n{}\n\nTranscript:\n{}\nRubric \"{}\":\n{}",
        question.trim(),
        render_transcript(transcript),
        rubric.title(),
        render_rubric(rubric)
    )
}

pub(crate) fn render_transcript(transcript: &[TranscriptTurn]) -> String {
    if transcript.is_empty() {
        return "(no responses recorded)\n".to_string();
    }

    let mut rendered = String::new();
    for turn in transcript {
        let _ = writeln!(rendered, "{}: {}", turn.sender.label(), turn.text.trim());
    }
    rendered
}

/// Flattens the table into one numbered block per criterion.
pub(crate) fn render_rubric(rubric: &Rubric) -> String {
    let mut rendered = String::new();
    for (position, row) in rubric.rows().iter().enumerate() {
        let _ = writeln!(
            rendered,
            "{}. {} (weightage {:.2}%)",
            position + 1,
            row.criteria(),
            row.weightage() * 100.0
        );
        for (column, value) in rubric.columns().iter().zip(row.values()) {
            let _ = writeln!(rendered, "   - {column}: {}", value.trim());
        }
    }
    rendered
}
