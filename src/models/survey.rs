use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Single,
    Multiple,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyQuestion {
    pub id: String,
    pub prompt: String,
    pub kind: QuestionKind,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
}

/// An answer is either a list of chosen options or free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Choices(Vec<String>),
    Text(String),
}

/// Represents the 'surveys' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Survey {
    pub id: i64,
    pub creator_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub questions: Json<Vec<SurveyQuestion>>,
    pub is_open: bool,
    pub closes_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[sqlx(default)]
    pub responses_count: i64,
}

impl Survey {
    pub fn accepts_responses(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.is_open && self.closes_at.is_none_or(|closes| closes > now)
    }
}

pub const SURVEY_SELECT: &str = r#"
    SELECT
        s.id, s.creator_id, s.title, s.description, s.questions, s.is_open, s.closes_at, s.created_at,
        (SELECT COUNT(*) FROM survey_responses sr WHERE sr.survey_id = s.id) AS responses_count
    FROM surveys s
"#;

fn validate_questions(questions: &[SurveyQuestion]) -> Result<(), validator::ValidationError> {
    if questions.is_empty() || questions.len() > 50 {
        return Err(validator::ValidationError::new("question_count"));
    }
    let mut ids = HashSet::new();
    for q in questions {
        if q.id.trim().is_empty() || !ids.insert(q.id.as_str()) {
            return Err(validator::ValidationError::new("duplicate_question_id"));
        }
        if q.prompt.trim().is_empty() {
            return Err(validator::ValidationError::new("empty_prompt"));
        }
        let needs_options = matches!(q.kind, QuestionKind::Single | QuestionKind::Multiple);
        if needs_options && q.options.len() < 2 {
            return Err(validator::ValidationError::new("too_few_options"));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSurveyRequest {
    #[validate(length(min = 3, max = 200))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(custom(function = validate_questions))]
    pub questions: Vec<SurveyQuestion>,
    pub closes_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitSurveyResponse {
    pub answers: HashMap<String, Answer>,
}

/// Checks a response against the survey's questions.
pub fn validate_answers(questions: &[SurveyQuestion], answers: &HashMap<String, Answer>) -> Result<(), String> {
    let by_id: HashMap<&str, &SurveyQuestion> = questions.iter().map(|q| (q.id.as_str(), q)).collect();

    if let Some(unknown) = answers.keys().find(|k| !by_id.contains_key(k.as_str())) {
        return Err(format!("Unknown question '{unknown}'"));
    }

    for q in questions {
        let Some(answer) = answers.get(&q.id) else {
            if q.required {
                return Err(format!("Question '{}' is required", q.id));
            }
            continue;
        };
        match (q.kind, answer) {
            (QuestionKind::Text, Answer::Text(text)) => {
                if q.required && text.trim().is_empty() {
                    return Err(format!("Question '{}' is required", q.id));
                }
                if text.len() > 5000 {
                    return Err(format!("Answer to '{}' is too long", q.id));
                }
            }
            (QuestionKind::Single, Answer::Choices(choices)) if choices.len() != 1 => {
                return Err(format!("Question '{}' takes exactly one option", q.id));
            }
            (QuestionKind::Single | QuestionKind::Multiple, Answer::Choices(choices)) => {
                // An optional question is skipped by leaving it out, not with `[]`.
                if choices.is_empty() {
                    return Err(format!("Question '{}' needs at least one option", q.id));
                }
                if let Some(bad) = choices.iter().find(|c| !q.options.contains(c)) {
                    return Err(format!("'{bad}' is not an option of '{}'", q.id));
                }
                let mut seen = HashSet::new();
                if let Some(repeated) = choices.iter().find(|c| !seen.insert(c.as_str())) {
                    return Err(format!("'{repeated}' is chosen more than once for '{}'", q.id));
                }
            }
            _ => return Err(format!("Wrong answer type for '{}'", q.id)),
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub prompt: String,
    pub kind: QuestionKind,
    /// Option → votes, every option present even with zero.
    pub counts: BTreeMap<String, i64>,
    pub text_answers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SurveyResults {
    pub survey_id: i64,
    pub responses: i64,
    pub questions: Vec<QuestionResult>,
}

/// Aggregates stored responses per question.
pub fn tally(questions: &[SurveyQuestion], responses: &[HashMap<String, Answer>]) -> Vec<QuestionResult> {
    questions
        .iter()
        .map(|q| {
            let mut counts: BTreeMap<String, i64> = q.options.iter().map(|o| (o.clone(), 0)).collect();
            let mut text_answers = Vec::new();
            for response in responses {
                match response.get(&q.id) {
                    Some(Answer::Choices(choices)) => {
                        let distinct: HashSet<&String> = choices.iter().collect();
                        for choice in distinct {
                            if let Some(count) = counts.get_mut(choice) {
                                *count += 1;
                            }
                        }
                    }
                    Some(Answer::Text(text)) if !text.trim().is_empty() => text_answers.push(text.clone()),
                    _ => {}
                }
            }
            QuestionResult {
                question_id: q.id.clone(),
                prompt: q.prompt.clone(),
                kind: q.kind,
                counts,
                text_answers,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions() -> Vec<SurveyQuestion> {
        vec![
            SurveyQuestion {
                id: "priority".to_string(),
                prompt: "Top priority for the ward?".to_string(),
                kind: QuestionKind::Single,
                options: vec!["Water".to_string(), "Roads".to_string(), "Schools".to_string()],
                required: true,
            },
            SurveyQuestion {
                id: "services".to_string(),
                prompt: "Which services do you use?".to_string(),
                kind: QuestionKind::Multiple,
                options: vec!["Clinic".to_string(), "Library".to_string()],
                required: false,
            },
            SurveyQuestion {
                id: "comments".to_string(),
                prompt: "Anything else?".to_string(),
                kind: QuestionKind::Text,
                options: vec![],
                required: false,
            },
        ]
    }

    fn answers(pairs: &[(&str, Answer)]) -> HashMap<String, Answer> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn choices(values: &[&str]) -> Answer {
        Answer::Choices(values.iter().map(|v| v.to_string()).collect())
    }

    #[test]
    fn valid_response_passes() {
        let a = answers(&[
            ("priority", choices(&["Water"])),
            ("services", choices(&["Clinic", "Library"])),
            ("comments", Answer::Text("More street lights".to_string())),
        ]);
        assert!(validate_answers(&questions(), &a).is_ok());
    }

    #[test]
    fn missing_required_answer_fails() {
        let a = answers(&[("services", choices(&["Clinic"]))]);
        assert!(validate_answers(&questions(), &a).unwrap_err().contains("required"));
    }

    #[test]
    fn single_choice_takes_exactly_one_known_option() {
        let two = answers(&[("priority", choices(&["Water", "Roads"]))]);
        assert!(validate_answers(&questions(), &two).is_err());

        let unknown = answers(&[("priority", choices(&["Parks"]))]);
        assert!(validate_answers(&questions(), &unknown).is_err());
    }

    #[test]
    fn multiple_choice_rejects_repeats_and_empty_lists() {
        let repeated = answers(&[("priority", choices(&["Water"])), ("services", choices(&["Clinic", "Clinic"]))]);
        assert!(validate_answers(&questions(), &repeated).unwrap_err().contains("more than once"));

        let empty = answers(&[("priority", choices(&["Water"])), ("services", choices(&[]))]);
        assert!(validate_answers(&questions(), &empty).unwrap_err().contains("at least one"));

        let skipped = answers(&[("priority", choices(&["Water"]))]);
        assert!(validate_answers(&questions(), &skipped).is_ok());
    }

    #[test]
    fn tally_counts_a_respondent_once_per_option() {
        let responses = vec![answers(&[("services", choices(&["Clinic", "Clinic"]))])];
        let results = tally(&questions(), &responses);
        assert_eq!(results[1].counts["Clinic"], 1);
    }

    #[test]
    fn unknown_questions_and_wrong_types_fail() {
        let a = answers(&[("priority", choices(&["Water"])), ("extra", Answer::Text("x".to_string()))]);
        assert!(validate_answers(&questions(), &a).is_err());

        let a = answers(&[("priority", Answer::Text("Water".to_string()))]);
        assert!(validate_answers(&questions(), &a).is_err());
    }

    #[test]
    fn tally_counts_every_option() {
        let responses = vec![
            answers(&[("priority", choices(&["Water"])), ("services", choices(&["Clinic"]))]),
            answers(&[
                ("priority", choices(&["Water"])),
                ("comments", Answer::Text("Fix the borehole".to_string())),
            ]),
            answers(&[("priority", choices(&["Roads"]))]),
        ];
        let results = tally(&questions(), &responses);

        assert_eq!(results[0].counts["Water"], 2);
        assert_eq!(results[0].counts["Roads"], 1);
        assert_eq!(results[0].counts["Schools"], 0);
        assert_eq!(results[1].counts["Clinic"], 1);
        assert_eq!(results[1].counts["Library"], 0);
        assert_eq!(results[2].text_answers, vec!["Fix the borehole".to_string()]);
    }

    #[test]
    fn question_definitions_are_checked() {
        let mut qs = questions();
        qs[1].options.truncate(1);
        assert!(validate_questions(&qs).is_err());

        let mut qs = questions();
        qs[2].id = "priority".to_string();
        assert!(validate_questions(&qs).is_err());

        assert!(validate_questions(&[]).is_err());
    }

    #[test]
    fn answers_deserialize_untagged() {
        let body: SubmitSurveyResponse =
            serde_json::from_str(r#"{"answers":{"priority":["Water"],"comments":"ok"}}"#).unwrap();
        assert_eq!(body.answers["priority"], choices(&["Water"]));
        assert_eq!(body.answers["comments"], Answer::Text("ok".to_string()));
    }
}
