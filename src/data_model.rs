use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkerError};

/// Inbound test-generation request. Wire casing is camelCase; all five
/// fields are mandatory and unknown extras are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    pub file_name: String,
    pub test_id: String,
    pub start_page: u32,
    pub end_page: u32,
    pub question_count: u32,
}

impl TestRequest {
    /// Field-level checks serde cannot express. A request failing these is
    /// treated the same as an unparsable payload.
    pub fn validate(&self) -> Result<()> {
        if self.file_name.is_empty() {
            return Err(WorkerError::ParseError(
                "fileName must not be empty".to_string(),
            ));
        }
        if self.test_id.is_empty() {
            return Err(WorkerError::ParseError(
                "testId must not be empty".to_string(),
            ));
        }
        if self.question_count == 0 {
            return Err(WorkerError::ParseError(
                "questionCount must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One answer option of a generated question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Answer {
    pub answer: String,
    pub correct: bool,
}

/// One generated question with its supporting quote and answer options.
/// Exactly one option should be correct, but that is the generation
/// backend's contract, not validated here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    pub question: String,
    pub quote: String,
    pub answers: Vec<Answer>,
}

/// Outbound response. Success and failure are distinct wire shapes and are
/// never mixed: a success carries the testId and questions, a failure
/// carries the error text and an empty questions list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TestResponse {
    Success {
        #[serde(rename = "fileName")]
        file_name: String,
        #[serde(rename = "testId")]
        test_id: String,
        questions: Vec<Question>,
    },
    Failure {
        #[serde(rename = "fileName")]
        file_name: String,
        error: String,
        questions: Vec<Question>,
    },
}

impl TestResponse {
    pub fn success(file_name: String, test_id: String, questions: Vec<Question>) -> Self {
        TestResponse::Success {
            file_name,
            test_id,
            questions,
        }
    }

    pub fn failure(file_name: String, error: String) -> Self {
        TestResponse::Failure {
            file_name,
            error,
            questions: Vec::new(),
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            TestResponse::Success { file_name, .. } => file_name,
            TestResponse::Failure { file_name, .. } => file_name,
        }
    }
}
