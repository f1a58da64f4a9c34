// External imports
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counts of (true class, predicted class) pairs
///
/// `counts[t][p]` is the number of samples of class `t` predicted as `p`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub class_names: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(y_true: &[usize], y_pred: &[usize], class_names: &[String]) -> Self {
        let n = class_names.len();
        let mut counts = vec![vec![0; n]; n];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            if t < n && p < n {
                counts[t][p] += 1;
            }
        }
        Self {
            class_names: class_names.to_vec(),
            counts,
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn correct(&self) -> usize {
        (0..self.num_classes()).map(|i| self.counts[i][i]).sum()
    }

    /// Samples whose true class is `class`
    pub fn support(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    /// Samples predicted as `class`
    pub fn predicted(&self, class: usize) -> usize {
        self.counts.iter().map(|row| row[class]).sum()
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().flatten().copied().max().unwrap_or(0)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .class_names
            .iter()
            .map(|n| n.len())
            .chain(std::iter::once(self.max_count().to_string().len()))
            .max()
            .unwrap_or(1)
            .max(4);

        write!(f, "{:>w$}", "true\\pred", w = width.max(9))?;
        for name in &self.class_names {
            write!(f, " {:>w$}", name, w = width)?;
        }
        writeln!(f)?;
        for (name, row) in self.class_names.iter().zip(&self.counts) {
            write!(f, "{:>w$}", name, w = width.max(9))?;
            for count in row {
                write!(f, " {:>w$}", count, w = width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Precision, recall and F1 of one class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class_name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class metrics plus accuracy and averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
    pub total: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn f1_score(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

impl ClassificationReport {
    /// Build the report from a confusion matrix; undefined ratios count as 0
    pub fn from_confusion(matrix: &ConfusionMatrix) -> Self {
        let total = matrix.total();
        let classes: Vec<ClassMetrics> = (0..matrix.num_classes())
            .map(|c| {
                let tp = matrix.counts[c][c];
                let precision = ratio(tp, matrix.predicted(c));
                let recall = ratio(tp, matrix.support(c));
                ClassMetrics {
                    class_name: matrix.class_names[c].clone(),
                    precision,
                    recall,
                    f1: f1_score(precision, recall),
                    support: matrix.support(c),
                }
            })
            .collect();

        let k = classes.len().max(1) as f64;
        let macro_avg = ClassMetrics {
            class_name: "macro avg".to_string(),
            precision: classes.iter().map(|m| m.precision).sum::<f64>() / k,
            recall: classes.iter().map(|m| m.recall).sum::<f64>() / k,
            f1: classes.iter().map(|m| m.f1).sum::<f64>() / k,
            support: total,
        };

        let weight = |value: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                classes
                    .iter()
                    .map(|m| value(m) * m.support as f64)
                    .sum::<f64>()
                    / total as f64
            }
        };
        let weighted_avg = ClassMetrics {
            class_name: "weighted avg".to_string(),
            precision: weight(|m| m.precision),
            recall: weight(|m| m.recall),
            f1: weight(|m| m.f1),
            support: total,
        };

        Self {
            accuracy: ratio(matrix.correct(), total),
            classes,
            macro_avg,
            weighted_avg,
            total,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|m| m.class_name.len())
            .max()
            .unwrap_or(0)
            .max("weighted avg".len());

        writeln!(
            f,
            "{:>w$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support",
            w = width
        )?;
        writeln!(f)?;
        for m in &self.classes {
            writeln!(
                f,
                "{:>w$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.class_name, m.precision, m.recall, m.f1, m.support,
                w = width
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>w$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.total,
            w = width
        )?;
        for m in [&self.macro_avg, &self.weighted_avg] {
            writeln!(
                f,
                "{:>w$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.class_name, m.precision, m.recall, m.f1, m.support,
                w = width
            )?;
        }
        Ok(())
    }
}

/// Confusion matrix and classification report of a set of predictions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub confusion: ConfusionMatrix,
    pub report: ClassificationReport,
}

/// Compare predictions against true labels
pub fn evaluate_predictions(y_true: &[usize], y_pred: &[usize], class_names: &[String]) -> Evaluation {
    let confusion = ConfusionMatrix::new(y_true, y_pred, class_names);
    let report = ClassificationReport::from_confusion(&confusion);
    Evaluation { confusion, report }
}
