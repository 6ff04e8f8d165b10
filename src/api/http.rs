use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use uuid::Uuid;

use crate::api::errors::{ApiError, ApiResult};
use crate::api::EduLitApi;
use crate::core::config::Settings;
use crate::schemas::{
    Answer, Assessment, AssessmentQuestion, Attempt, AttemptUpdate, NewAnswer, NewAttempt,
    NewQuestionOption, Question, QuestionOption,
};

/// Reqwest-backed implementation of the EduLit REST contract.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: Client,
    base_url: String,
    api_token: String,
}

impl HttpApi {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let api = settings.api();
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(api.connect_timeout_seconds))
            .timeout(Duration::from_secs(api.request_timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            api_token: api.api_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.api_token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.api_token)
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.authorize(self.client.get(self.url(path))).send().await?;
        decode(response).await
    }
}

#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    detail: String,
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            detail: error_detail(response).await,
        });
    }
    response.json::<T>().await.map_err(|err| ApiError::Decode(err.to_string()))
}

async fn expect_success(response: Response) -> ApiResult<()> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Status {
            status: status.as_u16(),
            detail: error_detail(response).await,
        });
    }
    Ok(())
}

async fn error_detail(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorEnvelope>(&body).map(|envelope| envelope.detail).unwrap_or(body)
}

#[async_trait]
impl EduLitApi for HttpApi {
    async fn get_assessment(&self, id: Uuid) -> ApiResult<Assessment> {
        self.get_json(&format!("assessments/{id}")).await
    }

    async fn list_assessment_questions(
        &self,
        assessment_id: Uuid,
    ) -> ApiResult<Vec<AssessmentQuestion>> {
        self.get_json(&format!("assessments/{assessment_id}/questions")).await
    }

    async fn list_attempts(&self, assessment_id: Uuid) -> ApiResult<Vec<Attempt>> {
        self.get_json(&format!("assessments/{assessment_id}/attempts")).await
    }

    async fn create_attempt(&self, payload: &NewAttempt) -> ApiResult<Attempt> {
        let response =
            self.authorize(self.client.post(self.url("attempts")).json(payload)).send().await?;
        decode(response).await
    }

    async fn update_attempt(&self, id: Uuid, payload: &AttemptUpdate) -> ApiResult<Attempt> {
        let response = self
            .authorize(self.client.put(self.url(&format!("attempts/{id}"))).json(payload))
            .send()
            .await?;
        decode(response).await
    }

    async fn get_question(&self, id: Uuid) -> ApiResult<Question> {
        self.get_json(&format!("questions/{id}")).await
    }

    async fn list_question_options(&self, question_id: Uuid) -> ApiResult<Vec<QuestionOption>> {
        self.get_json(&format!("questions/{question_id}/options")).await
    }

    async fn create_question_option(
        &self,
        payload: &NewQuestionOption,
    ) -> ApiResult<QuestionOption> {
        let response = self
            .authorize(self.client.post(self.url("question-options")).json(payload))
            .send()
            .await?;
        decode(response).await
    }

    async fn update_question_option(&self, id: Uuid, text: &str) -> ApiResult<QuestionOption> {
        let response = self
            .authorize(
                self.client
                    .put(self.url(&format!("question-options/{id}")))
                    .json(&json!({ "text": text })),
            )
            .send()
            .await?;
        decode(response).await
    }

    async fn list_answers(&self, attempt_id: Uuid) -> ApiResult<Vec<Answer>> {
        self.get_json(&format!("attempts/{attempt_id}/answers")).await
    }

    async fn create_answer(&self, payload: &NewAnswer) -> ApiResult<Answer> {
        let response =
            self.authorize(self.client.post(self.url("answers")).json(payload)).send().await?;
        decode(response).await
    }

    async fn delete_answer(&self, id: Uuid) -> ApiResult<()> {
        let response =
            self.authorize(self.client.delete(self.url(&format!("answers/{id}")))).send().await?;
        expect_success(response).await
    }

    async fn calculate_grading(&self, attempt_id: Uuid) -> ApiResult<()> {
        let response = self
            .authorize(self.client.post(self.url(&format!("attempts/{attempt_id}/grading"))))
            .send()
            .await?;
        expect_success(response).await
    }
}
