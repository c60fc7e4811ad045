//! Ranking and calibration metrics for binary risk scores.

use serde::{Deserialize, Serialize};

const EPSILON: f64 = 1e-15;
/// Share of highest-scored orders used for capture and lift.
pub const TOP_FRACTION: f64 = 0.10;

/// Mean binary cross-entropy. `None` when empty or lengths differ.
pub fn log_loss(probabilities: &[f64], labels: &[u8]) -> Option<f64> {
    if probabilities.is_empty() || probabilities.len() != labels.len() {
        return None;
    }
    let total: f64 = probabilities
        .iter()
        .zip(labels)
        .map(|(&p, &y)| {
            let p = p.clamp(EPSILON, 1.0 - EPSILON);
            if y == 1 {
                -p.ln()
            } else {
                -(1.0 - p).ln()
            }
        })
        .sum();
    Some(total / probabilities.len() as f64)
}

pub fn brier_score(probabilities: &[f64], labels: &[u8]) -> Option<f64> {
    if probabilities.is_empty() || probabilities.len() != labels.len() {
        return None;
    }
    let total: f64 = probabilities
        .iter()
        .zip(labels)
        .map(|(&p, &y)| (p - y as f64).powi(2))
        .sum();
    Some(total / probabilities.len() as f64)
}

/// Indices sorted by descending score.
fn ranked(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

/// Area under the precision-recall curve as average precision:
/// `Σ (R_n - R_{n-1}) P_n` over distinct score thresholds.
/// `None` without positives.
pub fn average_precision(scores: &[f64], labels: &[u8]) -> Option<f64> {
    if scores.len() != labels.len() {
        return None;
    }
    let positives = labels.iter().filter(|&&y| y == 1).count();
    if positives == 0 {
        return None;
    }

    let order = ranked(scores);
    let mut ap = 0.0;
    let mut true_pos = 0usize;
    let mut seen = 0usize;
    let mut prev_recall = 0.0;
    let mut i = 0;
    while i < order.len() {
        // tied scores form a single threshold
        let score = scores[order[i]];
        while i < order.len() && scores[order[i]] == score {
            true_pos += usize::from(labels[order[i]] == 1);
            seen += 1;
            i += 1;
        }
        let recall = true_pos as f64 / positives as f64;
        let precision = true_pos as f64 / seen as f64;
        ap += (recall - prev_recall) * precision;
        prev_recall = recall;
    }
    Some(ap)
}

/// ROC-AUC from average ranks (Mann-Whitney U). `None` unless both classes occur.
pub fn roc_auc(scores: &[f64], labels: &[u8]) -> Option<f64> {
    if scores.len() != labels.len() {
        return None;
    }
    let positives = labels.iter().filter(|&&y| y == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j < order.len() && scores[order[j]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based, ties share their mean rank
        let mean_rank = (i + 1 + j) as f64 / 2.0;
        let tied_positives = order[i..j].iter().filter(|&&k| labels[k] == 1).count();
        positive_rank_sum += mean_rank * tied_positives as f64;
        i = j;
    }

    let p = positives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

/// Number of rows in the top `fraction` (at least one).
fn top_count(len: usize, fraction: f64) -> usize {
    ((len as f64 * fraction).ceil() as usize).clamp(1, len.max(1))
}

/// Share of flagged rows that land in the top `fraction` of scores.
pub fn capture_at(scores: &[f64], flags: &[bool], fraction: f64) -> Option<f64> {
    let total = flags.iter().filter(|&&f| f).count();
    if scores.is_empty() || scores.len() != flags.len() || total == 0 {
        return None;
    }
    let k = top_count(scores.len(), fraction);
    let captured = ranked(scores)
        .into_iter()
        .take(k)
        .filter(|&i| flags[i])
        .count();
    Some(captured as f64 / total as f64)
}

/// Positive rate in the top `fraction` divided by the overall positive rate.
pub fn lift_at(scores: &[f64], labels: &[u8], fraction: f64) -> Option<f64> {
    if scores.is_empty() || scores.len() != labels.len() {
        return None;
    }
    let positives = labels.iter().filter(|&&y| y == 1).count();
    if positives == 0 {
        return None;
    }
    let k = top_count(scores.len(), fraction);
    let top_positives = ranked(scores)
        .into_iter()
        .take(k)
        .filter(|&i| labels[i] == 1)
        .count();
    let base_rate = positives as f64 / scores.len() as f64;
    Some((top_positives as f64 / k as f64) / base_rate)
}

/// Metrics of one scored partition. Undefined metrics serialize as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub rows: usize,
    pub positives: usize,
    pub base_rate: f64,
    pub pr_auc: Option<f64>,
    pub roc_auc: Option<f64>,
    pub log_loss: Option<f64>,
    pub brier: Option<f64>,
    pub top_decile_capture: Option<f64>,
    pub top_decile_lift: Option<f64>,
    pub one_star_capture: Option<f64>,
}

/// Evaluates risk scores against targets; `review_scores` feeds the 1-star capture.
pub fn evaluate(scores: &[f64], labels: &[u8], review_scores: &[u8]) -> EvaluationReport {
    let positives = labels.iter().filter(|&&y| y == 1).count();
    let base_rate = if labels.is_empty() {
        0.0
    } else {
        positives as f64 / labels.len() as f64
    };
    let targets: Vec<bool> = labels.iter().map(|&y| y == 1).collect();
    let one_star: Vec<bool> = review_scores.iter().map(|&s| s == 1).collect();

    EvaluationReport {
        rows: labels.len(),
        positives,
        base_rate,
        pr_auc: average_precision(scores, labels),
        roc_auc: roc_auc(scores, labels),
        log_loss: log_loss(scores, labels),
        brier: brier_score(scores, labels),
        top_decile_capture: capture_at(scores, &targets, TOP_FRACTION),
        top_decile_lift: lift_at(scores, labels, TOP_FRACTION),
        one_star_capture: capture_at(scores, &one_star, TOP_FRACTION),
    }
}

impl EvaluationReport {
    pub fn log_summary(&self, name: &str) {
        let fmt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.4}", v));
        tracing::info!(
            "📈 {}: rows={} base_rate={:.4} pr_auc={} roc_auc={} log_loss={} brier={} top10_capture={} top10_lift={} one_star_capture={}",
            name,
            self.rows,
            self.base_rate,
            fmt(self.pr_auc),
            fmt(self.roc_auc),
            fmt(self.log_loss),
            fmt(self.brier),
            fmt(self.top_decile_capture),
            fmt(self.top_decile_lift),
            fmt(self.one_star_capture)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Option<f64>, b: f64) -> bool {
        a.map_or(false, |a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn test_average_precision() {
        // ranking: 1, 0, 1, 0 -> (0.5 * 1) + (0.5 * 2/3)
        let scores = [0.9, 0.8, 0.7, 0.1];
        let labels = [1, 0, 1, 0];
        assert!(close(average_precision(&scores, &labels), 0.5 + 1.0 / 3.0));

        assert!(close(average_precision(&[0.9, 0.1], &[1, 0]), 1.0));
        assert_eq!(average_precision(&[0.5, 0.4], &[0, 0]), None);
    }

    #[test]
    fn test_average_precision_ties() {
        // one threshold holding both rows: precision 0.5 at recall 1
        assert!(close(average_precision(&[0.5, 0.5], &[1, 0]), 0.5));
    }

    #[test]
    fn test_roc_auc() {
        assert!(close(roc_auc(&[0.9, 0.8, 0.2, 0.1], &[1, 1, 0, 0]), 1.0));
        assert!(close(roc_auc(&[0.1, 0.2, 0.8, 0.9], &[1, 1, 0, 0]), 0.0));
        assert!(close(roc_auc(&[0.5, 0.5, 0.5, 0.5], &[1, 0, 1, 0]), 0.5));
        assert!(close(roc_auc(&[0.9, 0.3, 0.5, 0.1], &[1, 1, 0, 0]), 0.75));
        assert_eq!(roc_auc(&[0.1, 0.2], &[1, 1]), None);
    }

    #[test]
    fn test_log_loss_and_brier() {
        assert!(close(log_loss(&[0.5, 0.5], &[1, 0]), std::f64::consts::LN_2));
        assert!(close(brier_score(&[1.0, 0.0, 0.5], &[1, 0, 1]), 0.25 / 3.0));
        assert!(log_loss(&[0.0], &[1]).unwrap().is_finite());
        assert_eq!(log_loss(&[], &[]), None);
    }

    #[test]
    fn test_capture_and_lift() {
        let scores: Vec<f64> = (0..20).map(|i| i as f64).collect();
        // positives are the two highest scores plus one low score
        let labels: Vec<u8> = (0..20).map(|i| u8::from(i >= 18 || i == 3)).collect();
        let flags: Vec<bool> = labels.iter().map(|&y| y == 1).collect();

        // top 10% = 2 rows, both positive
        assert!(close(capture_at(&scores, &flags, 0.10), 2.0 / 3.0));
        // precision 1.0 over base rate 3/20
        assert!(close(lift_at(&scores, &labels, 0.10), 20.0 / 3.0));
    }

    #[test]
    fn test_evaluate_report() {
        let scores = [0.9, 0.6, 0.4, 0.2, 0.1];
        let labels = [1, 0, 1, 0, 0];
        let reviews = [1, 4, 2, 5, 1];
        let report = evaluate(&scores, &labels, &reviews);

        assert_eq!(report.rows, 5);
        assert_eq!(report.positives, 2);
        assert!((report.base_rate - 0.4).abs() < 1e-12);
        // top 10% of 5 rows rounds up to the single best row
        assert!(close(report.top_decile_capture, 0.5));
        assert!(close(report.one_star_capture, 0.5));
        assert!(report.pr_auc.is_some());

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["pr_auc"].is_number());
    }
}
