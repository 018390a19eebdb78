//! Server rendered HTML pages.
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use maud::{html, Markup, PreEscaped, DOCTYPE};

use churnwise_classifiers::config::ModelKind;
use churnwise_classifiers::data_handling::{load_customers, DatasetSummary};
use churnwise_classifiers::evaluation::{MetricsRecord, ModelMetrics};
use churnwise_classifiers::report::plots::{plot_churn_by_type, plot_metric_comparison};

use super::state::AppState;

type Page = (StatusCode, Html<String>);

const MODEL_KINDS: [ModelKind; 2] = [ModelKind::DecisionTree, ModelKind::Knn];

const PLOTLY_JS: &str = "https://cdn.plot.ly/plotly-2.12.1.min.js";

const STYLE: &str = "
body { font-family: sans-serif; margin: 0; color: #222; }
nav { background: #1f3b57; padding: 12px 24px; }
nav a { color: #fff; margin-right: 18px; text-decoration: none; }
main { padding: 24px; max-width: 1000px; }
table { border-collapse: collapse; margin: 12px 0; }
th, td { border: 1px solid #ccc; padding: 6px 12px; text-align: left; }
.stat { display: inline-block; margin: 8px 16px 8px 0; padding: 12px; background: #f5f5f5; border-radius: 5px; }
.error { color: #a00; }
.code-container { background-color: #f5f5f5; padding: 10px; border-radius: 5px; overflow-x: auto; font-family: monospace; white-space: pre-wrap; }
";

fn layout(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                title { (title) " | Churnwise" }
                style { (PreEscaped(STYLE)) }
                script src=(PLOTLY_JS) {}
            }
            body {
                nav {
                    a href="/" { "Home" }
                    a href="/analysis" { "Analysis" }
                    a href="/predict" { "Predict" }
                    a href="/comparison" { "Comparison" }
                    a href="/documentation" { "Documentation" }
                }
                main { (content) }
            }
        }
    }
}

fn render(status: StatusCode, markup: Markup) -> Page {
    (status, Html(markup.into_string()))
}

fn home_page() -> Markup {
    layout(
        "Home",
        html! {
            h1 { "Telecom Customer Churn Prediction" }
            p {
                "Predict whether a customer is likely to leave from their age, monthly spend, "
                "tenure, recharge plan, data usage and recent complaints. Two models are "
                "trained on the customer dataset: a decision tree and a k-nearest-neighbours "
                "classifier."
            }
            ul {
                li { a href="/analysis" { "Explore the dataset" } }
                li { a href="/predict" { "Score a customer" } }
                li { a href="/comparison" { "Compare the models" } }
            }
        },
    )
}

/// Run initialization and render `page` on success, or the home page with
/// a 500 status when the models cannot be made ready.
async fn with_models(state: &AppState, page: impl FnOnce() -> Markup) -> Page {
    match state.ready().await {
        Ok(_) => render(StatusCode::OK, page()),
        Err(e) => {
            log::error!("Model initialization failed: {}", e);
            render(StatusCode::INTERNAL_SERVER_ERROR, home_page())
        }
    }
}

pub async fn index(State(state): State<AppState>) -> Page {
    with_models(&state, home_page).await
}

pub async fn not_found() -> Page {
    render(StatusCode::NOT_FOUND, home_page())
}

pub async fn predict(State(state): State<AppState>) -> Page {
    let plans = match state.ready().await {
        Ok(serving) => serving.recharge_encoder().classes().to_vec(),
        Err(e) => {
            log::error!("Model initialization failed: {}", e);
            return render(StatusCode::INTERNAL_SERVER_ERROR, home_page());
        }
    };
    render(StatusCode::OK, predict_page(&plans))
}

fn predict_page(plans: &[String]) -> Markup {
    layout(
        "Predict",
        html! {
            h1 { "Predict churn" }
            form id="predict-form" {
                table {
                    tr { td { label for="model_type" { "Model" } } td {
                        select id="model_type" name="model_type" {
                            option value="best" { "Best" }
                            @for kind in MODEL_KINDS {
                                option value=(kind.key()) { (kind.display_name()) }
                            }
                        }
                    } }
                    tr { td { "Age" } td { input type="number" name="age" value="30" required; } }
                    tr { td { "Monthly spend (INR)" } td { input type="number" step="any" name="monthly_spend" value="499" required; } }
                    tr { td { "Tenure (months)" } td { input type="number" name="tenure" value="12" required; } }
                    tr { td { "Recharge type" } td {
                        select name="recharge_type" {
                            @for (code, plan) in plans.iter().enumerate() {
                                option value=(code) { (plan) }
                            }
                        }
                    } }
                    tr { td { "Data usage (GB/month)" } td { input type="number" step="any" name="data_usage" value="15" required; } }
                    tr { td { "Complaints (last 3 months)" } td { input type="number" name="complaints" value="1" required; } }
                }
                button type="submit" { "Predict" }
            }
            div id="result" {}
            script { (PreEscaped(PREDICT_JS)) }
        },
    )
}

const PREDICT_JS: &str = r#"
document.getElementById('predict-form').addEventListener('submit', async (event) => {
  event.preventDefault();
  const body = Object.fromEntries(new FormData(event.target).entries());
  const response = await fetch('/api/predict', {
    method: 'POST',
    headers: { 'Content-Type': 'application/json' },
    body: JSON.stringify(body),
  });
  const data = await response.json();
  const target = document.getElementById('result');
  if (!response.ok) {
    target.innerHTML = '<p class="error">' + data.error + '</p>';
    return;
  }
  const probability = data.probability === null ? 'unavailable' : (data.probability * 100).toFixed(1) + '%';
  target.innerHTML = '<h2>' + data.prediction + '</h2>'
    + '<p>Churn probability: ' + probability + '</p>'
    + (data.confidence ? '<p>Confidence: ' + data.confidence + '</p>' : '')
    + '<p>Model: ' + data.model_used + '</p>';
});
"#;

pub async fn documentation(State(state): State<AppState>) -> Page {
    with_models(&state, documentation_page).await
}

fn documentation_page() -> Markup {
    let endpoints = [
        ("POST", "/api/predict", "Score one customer. Body: model_type, age, monthly_spend, tenure, recharge_type, data_usage, complaints."),
        ("POST", "/api/evaluate_dataset", "Score every customer in the dataset. Body: model_type."),
        ("GET", "/api/dataset", "The customer dataset as JSON rows."),
        ("GET", "/api/metrics", "Held-out metrics of both models; 404 until the models are ready."),
    ];
    let example = r#"{
  "model_type": "decision_tree",
  "age": 25,
  "monthly_spend": 299,
  "tenure": 6,
  "recharge_type": 0,
  "data_usage": 12,
  "complaints": 2
}"#;

    layout(
        "Documentation",
        html! {
            h1 { "API documentation" }
            table {
                tr { th { "Method" } th { "Path" } th { "Description" } }
                @for (method, path, description) in endpoints {
                    tr { td { (method) } td { code { (path) } } td { (description) } }
                }
            }
            p {
                code { "model_type" } " is one of " code { "best" } ", " code { "decision_tree" }
                " or " code { "knn" } ". " code { "best" } " picks the model with the higher "
                "average of accuracy and F1 score."
            }
            h2 { "Example request" }
            div class="code-container" { pre { code { (example) } } }
            p {
                "Predictions with a churn probability of at least 0.7 or at most 0.3 are "
                "reported with High confidence, others with Medium."
            }
        },
    )
}

pub async fn analysis(State(state): State<AppState>) -> Page {
    let data_path = state.config().data_path.clone();
    let summary =
        tokio::task::spawn_blocking(move || load_customers(&data_path).and_then(|table| table.summary()))
            .await;
    match summary {
        Ok(Ok(summary)) => render(StatusCode::OK, analysis_page(Some(&summary))),
        Ok(Err(e)) => {
            log::error!("Error in analysis route: {}", e);
            render(StatusCode::OK, analysis_page(None))
        }
        Err(e) => {
            log::error!("Analysis task failed: {}", e);
            render(StatusCode::OK, analysis_page(None))
        }
    }
}

fn analysis_page(summary: Option<&DatasetSummary>) -> Markup {
    layout(
        "Analysis",
        html! {
            h1 { "Dataset analysis" }
            @match summary {
                Some(s) => {
                    div class="stat" { "Customers: " strong { (s.total_customers) } }
                    div class="stat" { "Churned: " strong { (s.churned) } }
                    div class="stat" { "Retained: " strong { (s.retained) } }
                    div class="stat" { "Churn rate: " strong { (s.churn_rate) "%" } }
                    div class="stat" { "Average age: " strong { (s.avg_age) } }
                    div class="stat" { "Average spend: " strong { "₹" (s.avg_spend) } }
                    div class="stat" { "Average tenure: " strong { (s.avg_tenure) " months" } }
                    h2 { "Churn by recharge type" }
                    table {
                        tr { th { "Recharge type" } th { "Churned customers" } }
                        @for (plan, count) in &s.churn_by_type {
                            tr { td { (plan) } td { (count) } }
                        }
                    }
                    (PreEscaped(plot_churn_by_type(&s.churn_by_type, "Churn by recharge type")
                        .to_inline_html(Some("churn-by-type"))))
                }
                None => {
                    p class="error" { "Dataset statistics are unavailable." }
                }
            }
        },
    )
}

pub async fn comparison(State(state): State<AppState>) -> Page {
    let metrics = match state.ready().await {
        Ok(serving) => Some(serving.metrics().clone()),
        Err(e) => {
            log::error!("Model initialization failed: {}", e);
            None
        }
    };
    render(StatusCode::OK, comparison_page(metrics.as_ref()))
}

fn metric_row(m: &ModelMetrics) -> Markup {
    html! {
        tr {
            td { (m.model_name) }
            td { (format!("{:.4}", m.accuracy)) }
            td { (format!("{:.4}", m.precision)) }
            td { (format!("{:.4}", m.recall)) }
            td { (format!("{:.4}", m.f1_score)) }
            td { (format!("[[{}, {}], [{}, {}]]", m.true_negatives, m.false_positives, m.false_negatives, m.true_positives)) }
        }
    }
}

fn comparison_page(metrics: Option<&MetricsRecord>) -> Markup {
    layout(
        "Comparison",
        html! {
            h1 { "Model comparison" }
            @match metrics {
                Some(record) => {
                    table {
                        tr {
                            th { "Model" } th { "Accuracy" } th { "Precision" }
                            th { "Recall" } th { "F1 score" } th { "Confusion matrix" }
                        }
                        @for kind in MODEL_KINDS {
                            (metric_row(record.metrics_for(kind)))
                        }
                    }
                    @if !record.comparison.per_metric.is_empty() {
                        h2 { "Winner per metric" }
                        table {
                            tr { th { "Metric" } th { "Winner" } }
                            @for w in &record.comparison.per_metric {
                                tr { td { (w.metric) } td { (w.winner) } }
                            }
                        }
                    }
                    p {
                        "Recommended model: " strong { (record.comparison.recommended_model) }
                        (format!(
                            " (average of accuracy and F1: decision tree {:.4}, KNN {:.4})",
                            record.comparison.decision_tree_avg, record.comparison.knn_avg
                        ))
                    }
                    @if let Some(trained_at) = &record.trained_at {
                        p { "Trained at " (trained_at) }
                    }
                    (PreEscaped(plot_metric_comparison(record, "Decision Tree vs KNN")
                        .to_inline_html(Some("metric-comparison"))))
                }
                None => {
                    p class="error" { "No metrics available." }
                }
            }
        },
    )
}
