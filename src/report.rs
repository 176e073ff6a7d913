use std::fmt::Write;

use crate::pipeline::TrainedState;

const REPORT_FEATURES: usize = 10;

pub fn build_report(state: &TrainedState) -> String {
    let outcome = &state.outcome;
    let best = outcome.best();
    let dataset = &state.dataset;

    let mut output = String::new();

    let _ = writeln!(output, "# Appointment No-Show Model Report");
    let _ = writeln!(
        output,
        "Run {} trained at {}",
        state.run_id,
        state.trained_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Dataset");
    let _ = writeln!(
        output,
        "- {} appointments ({} train / {} test)",
        dataset.count, state.train_rows, state.test_rows
    );
    let _ = writeln!(
        output,
        "- no-show rate {:.1}%",
        dataset.no_show_rate * 100.0
    );
    let _ = writeln!(
        output,
        "- ages {}-{}, lead time {}-{} days",
        dataset.min_age, dataset.max_age, dataset.min_days_between, dataset.max_days_between
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Model Comparison");
    let _ = writeln!(
        output,
        "| Model | Accuracy | Precision | Recall | F1 | ROC-AUC |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|");
    for result in &outcome.results {
        let m = &result.metrics;
        let _ = writeln!(
            output,
            "| {} | {:.3} | {:.3} | {:.3} | {:.3} | {:.3} |",
            result.name, m.accuracy, m.precision, m.recall, m.f1, m.roc_auc
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Best model: **{}** (ROC-AUC {:.3})",
        best.name, best.metrics.roc_auc
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Top Features");

    match state.ranked_importance() {
        Some(ranked) => {
            for (feature, importance) in ranked.iter().take(REPORT_FEATURES) {
                let _ = writeln!(output, "- {}: {:.4}", feature, importance);
            }
        }
        None => {
            let _ = writeln!(
                output,
                "Feature importance is not available for {}.",
                best.name
            );
        }
    }

    output
}
