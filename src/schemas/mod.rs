pub mod assessment;
pub mod attempt;

pub use self::assessment::{
    Assessment, AssessmentQuestion, NewQuestionOption, Question, QuestionOption, QuestionType,
};
pub use self::attempt::{Answer, Attempt, AttemptUpdate, NewAnswer, NewAttempt};
