//! Text rendering of results
//!
//! Everything here is a pure function of a [`PredictionResult`] (or of fixed
//! reference data) and renders as plain text for the terminal.

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use voxscreen_common::{FeatureVector, PredictionResult, Verdict};

use crate::session::User;

pub const POSITIVE_HEADLINE: &str = "Parkinson's Indicators Detected";
pub const NEGATIVE_HEADLINE: &str = "No Significant Indicators";
pub const DISCLAIMER: &str = "This analysis is based on vocal pattern recognition and should be used for screening purposes only. Please consult with a healthcare professional for a proper diagnosis.";

/// Normalized values above this are flagged
pub const HIGH_THRESHOLD: f64 = 0.6;

/// Charted features: (schema name, display label, display range)
pub const KEY_FEATURES: [(&str, &str, (f64, f64)); 9] = [
    ("MDVP:Jitter(%)", "Jitter %", (0.0, 0.02)),
    ("Jitter:DDP", "Jitter DDP", (0.0, 0.02)),
    ("MDVP:Shimmer", "Shimmer", (0.0, 0.1)),
    ("Shimmer:APQ3", "Shimmer APQ3", (0.0, 0.07)),
    ("NHR", "Noise-Harm. Ratio", (0.0, 0.5)),
    ("HNR", "Harm-Noise Ratio", (10.0, 40.0)),
    ("RPDE", "RPDE", (0.0, 1.0)),
    ("DFA", "DFA", (0.5, 1.0)),
    ("PPE", "PPE", (0.0, 0.6)),
];

const BAR_WIDTH: usize = 30;

/// One bar of the feature chart
#[derive(Debug, Clone, PartialEq)]
pub struct ChartBar {
    pub name: &'static str,
    pub label: &'static str,
    pub value: f64,
    /// Position within the display range, clamped to [0, 1]
    pub normalized: f64,
    pub high: bool,
}

/// Scale `value` into `[min, max]`, clamped
pub fn normalize_to_range(value: f64, (min, max): (f64, f64)) -> f64 {
    if max <= min {
        return 0.0;
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Bars for the key features, largest raw value first
pub fn feature_chart(features: &FeatureVector) -> Vec<ChartBar> {
    let mut bars: Vec<ChartBar> = KEY_FEATURES
        .iter()
        .map(|&(name, label, range)| {
            let value = features.get(name).unwrap_or(0.0);
            let normalized = normalize_to_range(value, range);
            ChartBar {
                name,
                label,
                value,
                normalized,
                high: normalized > HIGH_THRESHOLD,
            }
        })
        .collect();

    bars.sort_by(|a, b| b.value.total_cmp(&a.value));
    bars
}

pub fn render_chart(bars: &[ChartBar]) -> String {
    let mut out = String::new();
    for bar in bars {
        let filled = (bar.normalized * BAR_WIDTH as f64).round() as usize;
        let _ = writeln!(
            out,
            "{:<18} {:>10.4} |{}{}|{}",
            bar.label,
            bar.value,
            "#".repeat(filled),
            " ".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)),
            if bar.high { " high" } else { "" }
        );
    }
    let _ = writeln!(
        out,
        "High values (>{}) may indicate irregularities; low values are typically normal.",
        HIGH_THRESHOLD
    );
    out
}

/// Headline, confidence and disclaimer for one result
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSummary {
    pub verdict: Verdict,
    pub headline: &'static str,
    /// "93%" or "N/A"
    pub confidence: String,
    pub message: Option<String>,
    pub disclaimer: &'static str,
}

impl PredictionSummary {
    pub fn new(result: &PredictionResult) -> Self {
        let headline = if result.verdict.is_positive() {
            POSITIVE_HEADLINE
        } else {
            NEGATIVE_HEADLINE
        };

        Self {
            verdict: result.verdict,
            headline,
            confidence: result.probability.percent_label(),
            message: result.message.clone(),
            disclaimer: DISCLAIMER,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.headline);
        let _ = writeln!(out, "Prediction Confidence: {}", self.confidence);
        if let Some(message) = &self.message {
            let _ = writeln!(out, "{}", message);
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", self.disclaimer);
        out
    }
}

/// Summary, then the feature chart
pub fn render_result(result: &PredictionResult) -> String {
    let mut out = PredictionSummary::new(result).render();
    out.push('\n');
    out.push_str(&render_chart(&feature_chart(&result.features)));
    out
}

/// Reference confusion matrix of the screening model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_positive: u32,
    pub false_positive: u32,
    pub true_negative: u32,
    pub false_negative: u32,
}

impl ConfusionMatrix {
    pub fn sensitivity(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.true_negative, self.true_negative + self.false_positive)
    }
}

fn ratio(num: u32, den: u32) -> f64 {
    if den == 0 {
        0.0
    } else {
        f64::from(num) / f64::from(den)
    }
}

/// Published model metrics; static, not computed from live results
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPerformance {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub auc: f64,
    pub confusion: ConfusionMatrix,
}

impl ModelPerformance {
    pub fn reference() -> Self {
        Self {
            accuracy: 0.92,
            precision: 0.89,
            recall: 0.94,
            f1: 0.91,
            auc: 0.95,
            confusion: ConfusionMatrix {
                true_positive: 47,
                false_positive: 6,
                true_negative: 48,
                false_negative: 3,
            },
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Model Performance");
        for (label, value) in [
            ("Accuracy", self.accuracy),
            ("Precision", self.precision),
            ("Recall (Sensitivity)", self.recall),
            ("F1 Score", self.f1),
            ("AUC-ROC", self.auc),
        ] {
            let _ = writeln!(out, "  {:<22} {:>5.0}%", label, value * 100.0);
        }

        let c = &self.confusion;
        let _ = writeln!(out);
        let _ = writeln!(out, "Confusion Matrix");
        let _ = writeln!(out, "  True Positive  {:>4}   False Positive {:>4}", c.true_positive, c.false_positive);
        let _ = writeln!(out, "  False Negative {:>4}   True Negative  {:>4}", c.false_negative, c.true_negative);
        let _ = writeln!(out, "  Sensitivity {:.1}%  Specificity {:.1}%", c.sensitivity() * 100.0, c.specificity() * 100.0);
        out
    }
}

/// Patient dashboard header
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub name: String,
    pub id: String,
    pub total_tests: usize,
    pub last_test: Option<DateTime<Utc>>,
    pub latest_verdict: Option<Verdict>,
}

impl DashboardSummary {
    pub fn for_user(user: &User) -> Self {
        let latest = user.test_history.iter().max_by_key(|entry| entry.date);
        Self {
            name: user.name.clone(),
            id: user.id.clone(),
            total_tests: user.test_history.len(),
            last_test: latest.map(|entry| entry.date),
            latest_verdict: latest.map(|entry| entry.result.verdict),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Name: {}   ID: {}", self.name, self.id);
        let _ = writeln!(out, "Previous Tests: {}", self.total_tests);
        match (self.last_test, self.latest_verdict) {
            (Some(date), Some(verdict)) => {
                let _ = writeln!(out, "Last Test: {} ({})", date.format("%Y-%m-%d %H:%M"), verdict);
            }
            _ => {
                let _ = writeln!(out, "Last Test: none");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxscreen_common::{Preset, Probability};

    fn result(verdict: Verdict, probability: Probability) -> PredictionResult {
        PredictionResult {
            verdict,
            probability,
            message: Some("Model says so".to_string()),
            features: Preset::Parkinsons.values(),
        }
    }

    #[test]
    fn test_normalize_to_range() {
        assert_eq!(normalize_to_range(0.01, (0.0, 0.02)), 0.5);
        assert_eq!(normalize_to_range(-1.0, (0.0, 0.02)), 0.0);
        assert_eq!(normalize_to_range(50.0, (10.0, 40.0)), 1.0);
        assert_eq!(normalize_to_range(1.0, (1.0, 1.0)), 0.0);
    }

    #[test]
    fn test_chart_sorted_descending_and_flagged() {
        let bars = feature_chart(&Preset::Parkinsons.values());
        assert_eq!(bars.len(), 9);
        assert_eq!(bars[0].name, "HNR");
        assert!(bars.windows(2).all(|w| w[0].value >= w[1].value));

        let ddp = bars.iter().find(|b| b.name == "Jitter:DDP").unwrap();
        assert!(ddp.high);
        let ppe = bars.iter().find(|b| b.name == "PPE").unwrap();
        assert!(!ppe.high);
        let nhr = bars.iter().find(|b| b.name == "NHR").unwrap();
        assert!(!nhr.high);
    }

    #[test]
    fn test_chart_renders_four_decimals() {
        let text = render_chart(&feature_chart(&Preset::Parkinsons.values()));
        assert!(text.contains("19.0850"));
        assert!(text.contains("0.3145"));
    }

    #[test]
    fn test_summary_headlines() {
        let positive = PredictionSummary::new(&result(Verdict::Positive, Probability::Known(0.93)));
        assert_eq!(positive.headline, POSITIVE_HEADLINE);
        assert_eq!(positive.confidence, "93%");

        let negative = PredictionSummary::new(&result(Verdict::Negative, Probability::Unknown));
        assert_eq!(negative.headline, NEGATIVE_HEADLINE);
        assert_eq!(negative.confidence, "N/A");
        assert!(negative.render().contains(DISCLAIMER));
    }

    #[test]
    fn test_model_performance_derived_rates() {
        let perf = ModelPerformance::reference();
        assert!((perf.confusion.sensitivity() - 0.94).abs() < 1e-9);
        assert!((perf.confusion.specificity() - 48.0 / 54.0).abs() < 1e-9);
        assert!(perf.render().contains("AUC-ROC"));
    }
}
