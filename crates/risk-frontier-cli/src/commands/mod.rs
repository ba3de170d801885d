pub mod dashboard;
pub mod questionnaire;
