use std::collections::BTreeMap;

use plotly::layout::{Axis, BarMode, Layout};
use plotly::{Bar, Plot};

use crate::evaluation::MetricsRecord;

/// Bar chart of churned customers per recharge plan.
pub fn plot_churn_by_type(churn_by_type: &BTreeMap<String, usize>, title: &str) -> Plot {
    let plans: Vec<String> = churn_by_type.keys().cloned().collect();
    let counts: Vec<usize> = churn_by_type.values().copied().collect();

    let trace = Bar::new(plans, counts).name("Churned customers");

    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().title("Recharge type"))
        .y_axis(Axis::new().title("Churned customers"));

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(layout);
    plot
}

/// Grouped bars of accuracy, precision, recall and F1 for both models.
pub fn plot_metric_comparison(metrics: &MetricsRecord, title: &str) -> Plot {
    let names = vec![
        "Accuracy".to_string(),
        "Precision".to_string(),
        "Recall".to_string(),
        "F1 Score".to_string(),
    ];
    let values = |m: &crate::evaluation::ModelMetrics| {
        vec![m.accuracy, m.precision, m.recall, m.f1_score]
    };

    let tree = Bar::new(names.clone(), values(&metrics.decision_tree)).name("Decision Tree");
    let knn = Bar::new(names, values(&metrics.knn)).name("KNN");

    let layout = Layout::new()
        .title(title)
        .bar_mode(BarMode::Group)
        .x_axis(Axis::new().title("Metric"))
        .y_axis(Axis::new().title("Score").range(vec![0.0, 1.0]));

    let mut plot = Plot::new();
    plot.add_trace(tree);
    plot.add_trace(knn);
    plot.set_layout(layout);
    plot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn churn_chart_renders_every_plan() {
        let mut counts = BTreeMap::new();
        counts.insert("Postpaid".to_string(), 1);
        counts.insert("Prepaid (28 Days)".to_string(), 2);
        let html = plot_churn_by_type(&counts, "Churn by plan").to_inline_html(Some("churn"));
        assert!(html.contains("Postpaid"));
        assert!(html.contains("Churned customers"));
    }
}
