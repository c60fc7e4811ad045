//! Gradient-boosted decision trees for binary classification.
//!
//! Logistic loss, second-order leaf values, quantile-binned features and a learned
//! default direction for missing (`NaN`) values. Leaf values already include the
//! learning rate, so the raw margin is `base_score + Σ leaf`.

use crate::model::metrics::log_loss;
use crate::utils::error::{Result, RiskError};
use crate::utils::validation::{validate_positive_number, validate_range, Validate};
use serde::{Deserialize, Serialize};

const MISSING_BIN: u16 = u16::MAX;
const MAX_BINS_LIMIT: usize = 1024;
const MIN_HESSIAN: f64 = 1e-6;

/// Boosting hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoosterParams {
    /// Maximum number of boosting rounds (trees)
    pub num_trees: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Shrinkage applied to every leaf
    pub learning_rate: f64,
    /// Minimum training rows in a leaf
    pub min_samples_leaf: usize,
    /// Histogram bins per feature
    pub max_bins: usize,
    /// L2 regularization on leaf values
    pub lambda: f64,
    /// Minimum gain required to split a node
    pub min_split_gain: f64,
    /// Weight of positive rows relative to negatives
    pub scale_pos_weight: f64,
    /// Stop after this many rounds without validation improvement (0 disables)
    pub early_stopping_rounds: usize,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            num_trees: 300,
            max_depth: 6,
            learning_rate: 0.05,
            min_samples_leaf: 50,
            max_bins: 64,
            lambda: 1.0,
            min_split_gain: 0.0,
            scale_pos_weight: 1.0,
            early_stopping_rounds: 30,
        }
    }
}

impl Validate for BoosterParams {
    fn validate(&self) -> Result<()> {
        validate_positive_number("model.num_trees", self.num_trees, 1)?;
        validate_positive_number("model.max_depth", self.max_depth, 1)?;
        validate_positive_number("model.min_samples_leaf", self.min_samples_leaf, 1)?;
        validate_range("model.max_bins", self.max_bins, 2, MAX_BINS_LIMIT)?;
        validate_range("model.learning_rate", self.learning_rate, 1e-6, 1.0)?;
        validate_range("model.lambda", self.lambda, 0.0, f64::MAX)?;
        validate_range("model.min_split_gain", self.min_split_gain, 0.0, f64::MAX)?;
        validate_range("model.scale_pos_weight", self.scale_pos_weight, 1e-6, f64::MAX)?;
        Ok(())
    }
}

/// Row-major training data.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
}

impl Dataset {
    pub fn new(features: Vec<Vec<f64>>, labels: Vec<u8>) -> Result<Self> {
        if features.len() != labels.len() {
            return Err(RiskError::model(format!(
                "{} feature rows but {} labels",
                features.len(),
                labels.len()
            )));
        }
        if let Some(width) = features.first().map(Vec::len) {
            if let Some(bad) = features.iter().position(|row| row.len() != width) {
                return Err(RiskError::model(format!(
                    "row {} has {} features, expected {}",
                    bad,
                    features[bad].len(),
                    width
                )));
            }
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.features.first().map(Vec::len).unwrap_or(0)
    }

    pub fn positive_rate(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.labels.iter().filter(|&&l| l == 1).count() as f64 / self.len() as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        default_left: bool,
        left: usize,
        right: usize,
        gain: f64,
        cover: f64,
    },
    Leaf {
        value: f64,
        cover: f64,
    },
}

impl Node {
    pub fn cover(&self) -> f64 {
        match self {
            Node::Split { cover, .. } | Node::Leaf { cover, .. } => *cover,
        }
    }
}

/// Binary tree stored as a node array; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    /// `x <= threshold` goes left, `NaN` follows the learned default.
    pub fn goes_left(x: f64, threshold: f64, default_left: bool) -> bool {
        if x.is_nan() {
            default_left
        } else {
            x <= threshold
        }
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    default_left,
                    left,
                    right,
                    ..
                } => {
                    let x = features.get(*feature).copied().unwrap_or(f64::NAN);
                    idx = if Self::goes_left(x, *threshold, *default_left) {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    /// Cover-weighted mean output of the tree.
    pub fn expected_value(&self) -> f64 {
        self.expected_from(0)
    }

    fn expected_from(&self, idx: usize) -> f64 {
        match &self.nodes[idx] {
            Node::Leaf { value, .. } => *value,
            Node::Split { left, right, cover, .. } => {
                let l = self.nodes[*left].cover();
                let r = self.nodes[*right].cover();
                if *cover <= 0.0 {
                    return 0.0;
                }
                (l * self.expected_from(*left) + r * self.expected_from(*right)) / cover
            }
        }
    }
}

pub fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Quantile bin upper edges of one feature. Bin `b` holds `edges[b-1] < x <= edges[b]`.
#[derive(Debug, Clone)]
struct FeatureBins {
    edges: Vec<f64>,
}

impl FeatureBins {
    fn fit(values: impl Iterator<Item = f64>, max_bins: usize) -> Self {
        let mut sorted: Vec<f64> = values.filter(|v| !v.is_nan()).collect();
        sorted.sort_by(f64::total_cmp);

        let mut distinct = sorted.clone();
        distinct.dedup();

        let edges = if distinct.len() <= max_bins {
            distinct
        } else {
            let n = sorted.len();
            let mut edges: Vec<f64> = (1..=max_bins)
                .map(|i| sorted[((i * n) / max_bins).saturating_sub(1).min(n - 1)])
                .collect();
            edges.dedup();
            edges
        };

        Self { edges }
    }

    fn bin(&self, x: f64) -> u16 {
        if x.is_nan() || self.edges.is_empty() {
            return MISSING_BIN;
        }
        let idx = self.edges.partition_point(|e| *e < x);
        idx.min(self.edges.len() - 1) as u16
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct GradStats {
    grad: f64,
    hess: f64,
    count: usize,
}

impl GradStats {
    fn add(&mut self, g: f64, h: f64) {
        self.grad += g;
        self.hess += h;
        self.count += 1;
    }

    fn merged(self, other: GradStats) -> GradStats {
        GradStats {
            grad: self.grad + other.grad,
            hess: self.hess + other.hess,
            count: self.count + other.count,
        }
    }

    fn minus(self, other: GradStats) -> GradStats {
        GradStats {
            grad: self.grad - other.grad,
            hess: self.hess - other.hess,
            count: self.count - other.count,
        }
    }

    fn score(&self, lambda: f64) -> f64 {
        self.grad * self.grad / (self.hess + lambda)
    }
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    bin: u16,
    default_left: bool,
    gain: f64,
}

/// Builds one tree from binned features and per-row gradients.
struct TreeBuilder<'a> {
    params: &'a BoosterParams,
    bins: &'a [FeatureBins],
    binned: &'a [Vec<u16>],
    grad: &'a [f64],
    hess: &'a [f64],
    nodes: Vec<Node>,
    feature_gain: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    fn stats(&self, rows: &[usize]) -> GradStats {
        let mut stats = GradStats::default();
        for &i in rows {
            stats.add(self.grad[i], self.hess[i]);
        }
        stats
    }

    fn leaf_value(&self, stats: GradStats) -> f64 {
        -stats.grad / (stats.hess + self.params.lambda) * self.params.learning_rate
    }

    fn build(&mut self, rows: &[usize], depth: usize) -> usize {
        let idx = self.nodes.len();
        let stats = self.stats(rows);
        let cover = rows.len() as f64;

        let split = if depth >= self.params.max_depth || rows.len() < 2 * self.params.min_samples_leaf {
            None
        } else {
            self.best_split(rows, stats)
        };

        let Some(split) = split else {
            self.nodes.push(Node::Leaf {
                value: self.leaf_value(stats),
                cover,
            });
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows.iter().copied().partition(|&i| {
            let b = self.binned[split.feature][i];
            if b == MISSING_BIN {
                split.default_left
            } else {
                b <= split.bin
            }
        });

        self.feature_gain[split.feature] += split.gain;
        self.nodes.push(Node::Split {
            feature: split.feature,
            threshold: self.bins[split.feature].edges[split.bin as usize],
            default_left: split.default_left,
            left: 0,
            right: 0,
            gain: split.gain,
            cover,
        });

        let left = self.build(&left_rows, depth + 1);
        let right = self.build(&right_rows, depth + 1);
        if let Node::Split {
            left: l, right: r, ..
        } = &mut self.nodes[idx]
        {
            *l = left;
            *r = right;
        }
        idx
    }

    fn best_split(&self, rows: &[usize], total: GradStats) -> Option<SplitCandidate> {
        let lambda = self.params.lambda;
        let min_leaf = self.params.min_samples_leaf;
        let parent_score = total.score(lambda);
        let mut best: Option<SplitCandidate> = None;

        for (feature, bins) in self.bins.iter().enumerate() {
            let n_bins = bins.edges.len();
            if n_bins < 2 {
                continue;
            }

            let column = &self.binned[feature];
            let mut histogram = vec![GradStats::default(); n_bins];
            let mut missing = GradStats::default();
            for &i in rows {
                let b = column[i];
                if b == MISSING_BIN {
                    missing.add(self.grad[i], self.hess[i]);
                } else {
                    histogram[b as usize].add(self.grad[i], self.hess[i]);
                }
            }

            let present = total.minus(missing);
            let mut prefix = GradStats::default();
            // 最後一個 bin 之後不能再切
            for (bin, bucket) in histogram.iter().enumerate().take(n_bins - 1) {
                prefix = prefix.merged(*bucket);
                let suffix = present.minus(prefix);

                let directions: &[bool] = if missing.count == 0 {
                    if prefix.count >= suffix.count {
                        &[true]
                    } else {
                        &[false]
                    }
                } else {
                    &[false, true]
                };

                for &default_left in directions {
                    let (left, right) = if default_left {
                        (prefix.merged(missing), suffix)
                    } else {
                        (prefix, suffix.merged(missing))
                    };
                    if left.count < min_leaf || right.count < min_leaf {
                        continue;
                    }
                    if left.hess < MIN_HESSIAN || right.hess < MIN_HESSIAN {
                        continue;
                    }

                    let gain = 0.5 * (left.score(lambda) + right.score(lambda) - parent_score);
                    if gain <= self.params.min_split_gain {
                        continue;
                    }
                    if best.map_or(true, |b| gain > b.gain) {
                        best = Some(SplitCandidate {
                            feature,
                            bin: bin as u16,
                            default_left,
                            gain,
                        });
                    }
                }
            }
        }

        best
    }
}

/// Trained model: base log-odds plus additive trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booster {
    pub base_score: f64,
    pub trees: Vec<Tree>,
    pub feature_names: Vec<String>,
    /// Total split gain per feature over the kept trees
    pub feature_gain: Vec<f64>,
    pub best_iteration: Option<usize>,
}

impl Booster {
    /// Fits a booster. With `valid` and `early_stopping_rounds > 0`, training stops once the
    /// validation log loss has not improved for that many rounds and keeps the best rounds.
    pub fn fit(
        train: &Dataset,
        valid: Option<&Dataset>,
        feature_names: &[String],
        params: &BoosterParams,
    ) -> Result<Booster> {
        params.validate()?;
        if train.is_empty() {
            return Err(RiskError::model("training set is empty"));
        }
        let n_features = train.num_features();
        if n_features != feature_names.len() {
            return Err(RiskError::model(format!(
                "{} feature names for {} features",
                feature_names.len(),
                n_features
            )));
        }
        if let Some(v) = valid {
            if !v.is_empty() && v.num_features() != n_features {
                return Err(RiskError::model("validation set has a different feature count"));
            }
        }

        let n = train.len();
        let weight = |label: u8| if label == 1 { params.scale_pos_weight } else { 1.0 };
        let total_weight: f64 = train.labels.iter().map(|&l| weight(l)).sum();
        let positive_weight: f64 = train
            .labels
            .iter()
            .filter(|&&l| l == 1)
            .map(|&l| weight(l))
            .sum();
        let prior = (positive_weight / total_weight).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (prior / (1.0 - prior)).ln();

        tracing::info!(
            "🌲 Training booster on {} rows x {} features (positive rate {:.3})",
            n,
            n_features,
            train.positive_rate()
        );
        tracing::debug!("Booster parameters: {:?}", params);

        let bins: Vec<FeatureBins> = (0..n_features)
            .map(|f| FeatureBins::fit(train.features.iter().map(|row| row[f]), params.max_bins))
            .collect();
        let binned: Vec<Vec<u16>> = bins
            .iter()
            .enumerate()
            .map(|(f, b)| train.features.iter().map(|row| b.bin(row[f])).collect())
            .collect();

        let mut margins = vec![base_score; n];
        let mut valid_margins: Vec<f64> = valid.map(|v| vec![base_score; v.len()]).unwrap_or_default();
        let early_stopping = params.early_stopping_rounds > 0 && valid.map_or(false, |v| !v.is_empty());

        let mut trees: Vec<Tree> = Vec::with_capacity(params.num_trees);
        let mut gains: Vec<Vec<f64>> = Vec::with_capacity(params.num_trees);
        let mut best_loss = f64::INFINITY;
        let mut best_iteration = None;
        let all_rows: Vec<usize> = (0..n).collect();
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];

        for round in 0..params.num_trees {
            for i in 0..n {
                let p = sigmoid(margins[i]);
                let w = weight(train.labels[i]);
                grad[i] = w * (p - train.labels[i] as f64);
                hess[i] = w * p * (1.0 - p);
            }

            let mut builder = TreeBuilder {
                params,
                bins: &bins,
                binned: &binned,
                grad: &grad,
                hess: &hess,
                nodes: Vec::new(),
                feature_gain: vec![0.0; n_features],
            };
            builder.build(&all_rows, 0);
            let tree = Tree {
                nodes: builder.nodes,
            };

            for (m, row) in margins.iter_mut().zip(&train.features) {
                *m += tree.predict(row);
            }

            if let (true, Some(v)) = (early_stopping, valid) {
                for (m, row) in valid_margins.iter_mut().zip(&v.features) {
                    *m += tree.predict(row);
                }
                let probabilities: Vec<f64> = valid_margins.iter().map(|&m| sigmoid(m)).collect();
                let loss = log_loss(&probabilities, &v.labels).unwrap_or(f64::INFINITY);

                if loss < best_loss - 1e-12 {
                    best_loss = loss;
                    best_iteration = Some(round);
                }
                if round % 10 == 0 {
                    tracing::debug!("Round {}: validation log loss {:.5}", round + 1, loss);
                }
            }

            trees.push(tree);
            gains.push(builder.feature_gain);

            if let Some(best) = best_iteration {
                if early_stopping && round - best >= params.early_stopping_rounds {
                    tracing::info!(
                        "⏹️ Early stopping at round {}, best round {} (log loss {:.5})",
                        round + 1,
                        best + 1,
                        best_loss
                    );
                    break;
                }
            }
        }

        if let Some(best) = best_iteration {
            trees.truncate(best + 1);
            gains.truncate(best + 1);
        }

        let mut feature_gain = vec![0.0; n_features];
        for tree_gain in &gains {
            for (total, g) in feature_gain.iter_mut().zip(tree_gain) {
                *total += g;
            }
        }

        tracing::info!("✅ Booster trained with {} trees", trees.len());

        Ok(Booster {
            base_score,
            trees,
            feature_names: feature_names.to_vec(),
            feature_gain,
            best_iteration,
        })
    }

    pub fn num_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Raw log-odds.
    pub fn predict_margin(&self, features: &[f64]) -> f64 {
        self.base_score + self.trees.iter().map(|t| t.predict(features)).sum::<f64>()
    }

    pub fn predict_proba(&self, features: &[f64]) -> f64 {
        sigmoid(self.predict_margin(features))
    }

    pub fn predict_dataset(&self, dataset: &Dataset) -> Vec<f64> {
        dataset
            .features
            .iter()
            .map(|row| self.predict_proba(row))
            .collect()
    }

    /// Mean margin over the training distribution, the SHAP baseline.
    pub fn expected_value(&self) -> f64 {
        self.base_score + self.trees.iter().map(Tree::expected_value).sum::<f64>()
    }

    /// Gain share per feature, highest first.
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let total: f64 = self.feature_gain.iter().sum();
        let mut importance: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .zip(&self.feature_gain)
            .map(|(name, gain)| {
                let share = if total > 0.0 { gain / total } else { 0.0 };
                (name.clone(), share)
            })
            .collect();
        importance.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        importance
    }
}
