use super::{EvaluationRequest, ItemKind};

const QUESTION_RUBRIC: &str = "\
You are an expert Microsoft Excel instructor grading a written assessment.
Score the candidate's answer from 0 to 10 for technical accuracy, completeness and clarity.
10 means fully correct and well explained, 5 means partially correct, 0 means wrong or missing.";

const TASK_RUBRIC: &str = "\
You are an expert Microsoft Excel instructor grading a hands-on spreadsheet task.
The candidate's work is given as a JSON list of cell actions (timestamp, kind, cell, previous, new).
Score the work from 0 to 10: full marks when the final formula in the target cell is equivalent to the
expected one, partial credit for a reasonable approach with mistakes, 0 when nothing relevant was done.";

const RESPONSE_FORMAT: &str = "\
Respond ONLY with a JSON object of the form {\"score\": <integer 0-10>, \"justification\": \"<one or two sentences>\"}.";

/// Combine the fixed rubric with the item context and the captured response.
#[must_use]
pub fn build_prompt(request: &EvaluationRequest) -> String {
    let (rubric, expected_label, response_label) = match request.kind {
        ItemKind::Question => (QUESTION_RUBRIC, "Reference answer", "Candidate answer"),
        ItemKind::SpreadsheetTask => (TASK_RUBRIC, "Expected formula", "Candidate actions"),
    };

    format!(
        "{rubric}\n\n{RESPONSE_FORMAT}\n\nTask: {prompt}\n{expected_label}: {expected}\n{response_label}:\n{response}\n",
        prompt = request.prompt,
        expected = request.expected,
        response = request.response,
    )
}
