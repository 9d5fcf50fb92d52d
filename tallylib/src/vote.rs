//! Parsing of the structured vote carried in a memo.
//!
//! A ballot is up to three `;`-separated fields, each prefixed with its
//! 1-based question number: `1a maybe a comment;2c;3y`. Questions 1 and 2
//! take options a..e, question 3 takes y/n. A field that does not start with
//! its own question number is skipped rather than flagged, tolerating
//! reordered or missing answers.

pub const QUESTION_COUNT: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoteAnswer {
    /// 1-based question number.
    pub question: u8,
    /// Case-folded option code.
    pub option: char,
    /// Free text following the option character, trimmed.
    pub comment: String,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum VoteParseError {
    #[error("unexpected extra fields: {0}")]
    ExtraFields(String),
    #[error("could not parse memo response {0}: empty answer")]
    EmptyAnswer(u8),
    #[error("could not parse memo response {question}, unknown option {option:?} in {field:?}")]
    InvalidOption {
        question: u8,
        option: char,
        field: String,
    },
}

fn allowed_options(question: u8) -> &'static [char] {
    match question {
        3 => &['y', 'n'],
        _ => &['a', 'b', 'c', 'd', 'e'],
    }
}

/// Parse the decoded memo text into answers, in question order. A question
/// with no matching field simply has no entry in the output.
pub fn parse_answers(memo: &str) -> Result<Vec<VoteAnswer>, VoteParseError> {
    let fields: Vec<&str> = memo.split(';').collect();

    let junk: Vec<&str> = fields
        .iter()
        .skip(QUESTION_COUNT)
        .map(|field| field.trim())
        .filter(|field| !field.is_empty())
        .collect();
    if !junk.is_empty() {
        return Err(VoteParseError::ExtraFields(junk.join("; ")));
    }

    let mut answers = Vec::new();
    for (ix, field) in fields.iter().take(QUESTION_COUNT).enumerate() {
        let field = field.trim();
        let question = (ix + 1) as u8;
        let Some(full_answer) = field.strip_prefix(char::from(b'0' + question)) else {
            continue;
        };

        let mut chars = full_answer.chars();
        let Some(first) = chars.next() else {
            return Err(VoteParseError::EmptyAnswer(question));
        };
        let option = first.to_ascii_lowercase();
        if !allowed_options(question).contains(&option) {
            return Err(VoteParseError::InvalidOption {
                question,
                option,
                field: field.to_string(),
            });
        }

        answers.push(VoteAnswer {
            question,
            option,
            comment: chars.as_str().trim().to_string(),
        });
    }

    Ok(answers)
}
