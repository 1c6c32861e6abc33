//! Holdout evaluation metrics

use crate::pipeline::Outcome;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(labels: &[Outcome], predicted: &[Outcome]) -> Self {
        let mut m = Self::default();
        for (actual, guess) in labels.iter().zip(predicted) {
            match (actual, guess) {
                (Outcome::Lost, Outcome::Lost) => m.true_negative += 1,
                (Outcome::Lost, Outcome::Won) => m.false_positive += 1,
                (Outcome::Won, Outcome::Lost) => m.false_negative += 1,
                (Outcome::Won, Outcome::Won) => m.true_positive += 1,
            }
        }
        m
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.true_negative + self.true_positive) as f64 / total as f64
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[[{} {}] [{} {}]]",
            self.true_negative, self.false_positive, self.false_negative, self.true_positive
        )
    }
}

/// Metrics from scoring a holdout split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub samples: usize,
    pub accuracy: f64,
    /// `None` when the holdout contains only one class.
    pub roc_auc: Option<f64>,
    pub confusion: ConfusionMatrix,
}

pub fn classify(probabilities: &[f64], threshold: f64) -> Vec<Outcome> {
    probabilities
        .iter()
        .map(|&p| if p >= threshold { Outcome::Won } else { Outcome::Lost })
        .collect()
}

pub fn evaluate(labels: &[Outcome], probabilities: &[f64], threshold: f64) -> Evaluation {
    let predicted = classify(probabilities, threshold);
    let confusion = ConfusionMatrix::from_predictions(labels, &predicted);
    Evaluation {
        samples: labels.len(),
        accuracy: confusion.accuracy(),
        roc_auc: roc_auc(labels, probabilities),
        confusion,
    }
}

/// Area under the ROC curve via the rank-sum statistic, averaging tied ranks.
pub fn roc_auc(labels: &[Outcome], scores: &[f64]) -> Option<f64> {
    let positives = labels.iter().filter(|l| **l == Outcome::Won).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..labels.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; labels.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; ties share the mean of their positions
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(l, _)| **l == Outcome::Won)
        .map(|(_, r)| r)
        .sum();
    let p = positives as f64;
    let n = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use Outcome::{Lost, Won};

    #[test]
    fn test_confusion_and_accuracy() {
        let labels = [Won, Won, Lost, Lost];
        let predicted = [Won, Lost, Lost, Won];
        let m = ConfusionMatrix::from_predictions(&labels, &predicted);

        assert_eq!(m.true_positive, 1);
        assert_eq!(m.false_negative, 1);
        assert_eq!(m.true_negative, 1);
        assert_eq!(m.false_positive, 1);
        assert_eq!(m.accuracy(), 0.5);
        assert_eq!(m.to_string(), "[[1 1] [1 1]]");
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let labels = [Lost, Lost, Won, Won];
        assert_eq!(roc_auc(&labels, &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&labels, &[0.9, 0.8, 0.2, 0.1]), Some(0.0));
    }

    #[test]
    fn test_roc_auc_ties() {
        let labels = [Lost, Won];
        assert_eq!(roc_auc(&labels, &[0.5, 0.5]), Some(0.5));

        let labels = [Lost, Lost, Won, Won];
        // one positive tied with one negative, the other strictly above
        assert_eq!(roc_auc(&labels, &[0.1, 0.6, 0.6, 0.9]), Some(0.875));
    }

    #[test]
    fn test_roc_auc_single_class() {
        assert_eq!(roc_auc(&[Won, Won], &[0.1, 0.9]), None);
        assert_eq!(roc_auc(&[], &[]), None);
    }

    #[test]
    fn test_evaluate_threshold() {
        let eval = evaluate(&[Lost, Won], &[0.3, 0.5], 0.5);
        assert_eq!(eval.samples, 2);
        assert_eq!(eval.accuracy, 1.0);
        assert_eq!(eval.roc_auc, Some(1.0));
    }
}
