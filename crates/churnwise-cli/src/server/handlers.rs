//! JSON endpoints under `/api`.
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use churnwise_classifiers::config::ModelChoice;
use churnwise_classifiers::data_handling::{load_customers, CustomerRecord};
use churnwise_classifiers::evaluation::MetricsRecord;
use churnwise_classifiers::serving::{label_name, Confidence, CustomerFeatures, ServingModels};

use super::error::ApiError;
use super::state::AppState;

/// A JSON number, or a string holding one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrText {
    Number(f64),
    Text(String),
}

impl NumberOrText {
    fn to_f64(&self, field: &str) -> Result<f64, ApiError> {
        let value = match self {
            NumberOrText::Number(n) => *n,
            NumberOrText::Text(s) => s.trim().parse::<f64>().map_err(|_| invalid(field, s))?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(invalid(field, &value.to_string()))
        }
    }

    /// Whole number; fractional JSON numbers are truncated.
    fn to_i64(&self, field: &str) -> Result<i64, ApiError> {
        match self {
            NumberOrText::Number(n) if n.is_finite() => Ok(n.trunc() as i64),
            NumberOrText::Number(n) => Err(invalid(field, &n.to_string())),
            NumberOrText::Text(s) => s.trim().parse::<i64>().map_err(|_| invalid(field, s)),
        }
    }
}

fn invalid(field: &str, value: &str) -> ApiError {
    ApiError::BadRequest(format!("invalid value for '{}': {}", field, value))
}

fn default_model_type() -> String {
    "best".to_string()
}

fn parse_choice(model_type: &str) -> Result<ModelChoice, ApiError> {
    model_type.parse::<ModelChoice>().map_err(ApiError::BadRequest)
}

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    #[serde(default = "default_model_type")]
    pub model_type: String,
    pub age: NumberOrText,
    pub monthly_spend: NumberOrText,
    pub tenure: NumberOrText,
    /// Plan code, or the plan label itself.
    pub recharge_type: NumberOrText,
    pub data_usage: NumberOrText,
    pub complaints: NumberOrText,
}

impl PredictRequest {
    fn features(&self, serving: &ServingModels) -> Result<CustomerFeatures, ApiError> {
        let n_plans = serving.recharge_encoder().len();
        let recharge_type = match &self.recharge_type {
            NumberOrText::Text(s) if s.trim().parse::<i64>().is_err() => {
                serving.encode_recharge_type(s.trim())?
            }
            other => {
                let code = other.to_i64("recharge_type")?;
                if code < 0 || code as usize >= n_plans {
                    return Err(ApiError::BadRequest(format!(
                        "recharge_type must lie in 0..{}, got {}",
                        n_plans, code
                    )));
                }
                code as usize
            }
        };

        Ok(CustomerFeatures {
            age: self.age.to_i64("age")?,
            monthly_spend: self.monthly_spend.to_f64("monthly_spend")?,
            tenure: self.tenure.to_i64("tenure")?,
            recharge_type,
            data_usage: self.data_usage.to_f64("data_usage")?,
            complaints: self.complaints.to_i64("complaints")?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub prediction: &'static str,
    pub prediction_value: usize,
    pub probability: Option<f64>,
    pub model_used: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| {
        log::warn!("[PREDICT] rejected body: {}", e.body_text());
        ApiError::from(e)
    })?;
    log::info!("[PREDICT] model requested: {}", request.model_type);

    let choice = parse_choice(&request.model_type)?;
    let serving = state.ready().await?;
    let features = request.features(&serving)?;
    log::debug!("[PREDICT] features: {:?}", features.to_row());

    let result = serving.predict_single(choice, &features).map_err(|e| {
        log::error!("[PREDICT] {}", e);
        ApiError::from(e)
    })?;

    let response = PredictResponse {
        prediction: label_name(result.label),
        prediction_value: result.label,
        probability: result.probability.value(),
        model_used: result.model.display_name(),
        confidence: result.confidence,
    };
    log::info!("[PREDICT] {:?}", response);
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    #[serde(default = "default_model_type")]
    pub model_type: String,
}

#[derive(Debug, Serialize)]
pub struct EvaluatedCustomer {
    pub customer_id: String,
    pub prediction: &'static str,
    pub probability: Option<f64>,
    pub actual: &'static str,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub total: usize,
    pub churned: usize,
    pub accuracy: f64,
    pub model_used: &'static str,
    pub predictions: Vec<EvaluatedCustomer>,
}

pub async fn evaluate_dataset(
    State(state): State<AppState>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Result<Json<EvaluateResponse>, ApiError> {
    let Json(request) = payload?;
    log::info!("[EVALUATE] model requested: {}", request.model_type);

    let choice = parse_choice(&request.model_type)?;
    let serving = state.ready().await?;
    let data_path = state.config().data_path.clone();
    let evaluation = run_blocking(move || {
        let table = load_customers(&data_path)?;
        serving.evaluate_dataset(choice, &table)
    })
    .await
    .map_err(|e| {
        log::error!("[EVALUATE] {:?}", e);
        e
    })?;

    Ok(Json(EvaluateResponse {
        total: evaluation.total,
        churned: evaluation.churned,
        accuracy: evaluation.accuracy,
        model_used: evaluation.model.display_name(),
        predictions: evaluation
            .predictions
            .into_iter()
            .map(|row| EvaluatedCustomer {
                customer_id: row.customer_id,
                prediction: label_name(row.predicted),
                probability: row.probability,
                actual: label_name(row.actual),
            })
            .collect(),
    }))
}

pub async fn dataset(State(state): State<AppState>) -> Result<Json<Vec<CustomerRecord>>, ApiError> {
    let data_path = state.config().data_path.clone();
    let records = run_blocking(move || load_customers(&data_path)?.records()).await?;
    Ok(Json(records))
}

/// Metrics of the serving models, initializing them on first use. 404 when
/// the models cannot be made ready.
pub async fn metrics(State(state): State<AppState>) -> Result<Json<MetricsRecord>, ApiError> {
    match state.ready().await {
        Ok(serving) => Ok(Json(serving.metrics().clone())),
        Err(e) => {
            log::error!("Metrics unavailable: {}", e);
            Err(ApiError::NotFound("Metrics not available".to_string()))
        }
    }
}

/// File reads and whole-dataset inference run off the async workers.
async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> churnwise_classifiers::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::BadRequest(format!("worker task failed: {}", e)))?
        .map_err(ApiError::from)
}
