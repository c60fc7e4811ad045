//! Path-dependent TreeSHAP (Lundberg et al., Algorithm 2).
//!
//! Contributions are in log-odds space and satisfy
//! `expected_value + Σ contributions == predict_margin`.

use crate::model::gbdt::{Booster, Node, Tree};

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

fn extend_path(
    path: &mut Vec<PathElement>,
    unique_depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: Option<usize>,
) {
    path.truncate(unique_depth);
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if unique_depth == 0 { 1.0 } else { 0.0 },
    });

    let denom = (unique_depth + 1) as f64;
    for i in (0..unique_depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / denom;
        path[i].pweight = zero_fraction * path[i].pweight * (unique_depth - i) as f64 / denom;
    }
}

fn unwind_path(path: &mut [PathElement], unique_depth: usize, path_index: usize) {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (unique_depth + 1) as f64;
    let mut next_one_portion = path[unique_depth].pweight;

    for i in (0..unique_depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion =
                tmp - path[i].pweight * zero_fraction * (unique_depth - i) as f64 / denom;
        } else {
            path[i].pweight = path[i].pweight * denom / (zero_fraction * (unique_depth - i) as f64);
        }
    }

    for i in path_index..unique_depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
}

fn unwound_path_sum(path: &[PathElement], unique_depth: usize, path_index: usize) -> f64 {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let denom = (unique_depth + 1) as f64;
    let mut next_one_portion = path[unique_depth].pweight;
    let mut total = 0.0;

    for i in (0..unique_depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion =
                path[i].pweight - tmp * zero_fraction * (unique_depth - i) as f64 / denom;
        } else if zero_fraction != 0.0 {
            total += path[i].pweight / zero_fraction / ((unique_depth - i) as f64 / denom);
        }
    }

    total
}

struct TreeExplainer<'a> {
    tree: &'a Tree,
    x: &'a [f64],
    phi: &'a mut [f64],
}

impl TreeExplainer<'_> {
    #[allow(clippy::too_many_arguments)]
    fn recurse(
        &mut self,
        node: usize,
        parent_path: &[PathElement],
        mut unique_depth: usize,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        let mut path = parent_path[..unique_depth].to_vec();
        extend_path(&mut path, unique_depth, zero_fraction, one_fraction, feature);

        match &self.tree.nodes[node] {
            Node::Leaf { value, .. } => {
                for i in 1..=unique_depth {
                    let weight = unwound_path_sum(&path, unique_depth, i);
                    let element = path[i];
                    if let Some(f) = element.feature {
                        self.phi[f] += weight * (element.one_fraction - element.zero_fraction) * value;
                    }
                }
            }
            Node::Split {
                feature: split_feature,
                threshold,
                default_left,
                left,
                right,
                cover,
                ..
            } => {
                let x = self.x.get(*split_feature).copied().unwrap_or(f64::NAN);
                let (hot, cold) = if Tree::goes_left(x, *threshold, *default_left) {
                    (*left, *right)
                } else {
                    (*right, *left)
                };

                let mut incoming_zero = 1.0;
                let mut incoming_one = 1.0;
                if let Some(k) = (1..=unique_depth).find(|&k| path[k].feature == Some(*split_feature)) {
                    incoming_zero = path[k].zero_fraction;
                    incoming_one = path[k].one_fraction;
                    unwind_path(&mut path, unique_depth, k);
                    unique_depth -= 1;
                }

                let hot_zero = self.tree.nodes[hot].cover() / cover;
                let cold_zero = self.tree.nodes[cold].cover() / cover;

                self.recurse(
                    hot,
                    &path,
                    unique_depth + 1,
                    hot_zero * incoming_zero,
                    incoming_one,
                    Some(*split_feature),
                );
                self.recurse(
                    cold,
                    &path,
                    unique_depth + 1,
                    cold_zero * incoming_zero,
                    0.0,
                    Some(*split_feature),
                );
            }
        }
    }
}

/// Adds one tree's contributions for `x` into `phi`.
pub fn tree_shap(tree: &Tree, x: &[f64], phi: &mut [f64]) {
    if tree.nodes.is_empty() {
        return;
    }
    let mut explainer = TreeExplainer { tree, x, phi };
    explainer.recurse(0, &[], 0, 1.0, 1.0, None);
}

/// Per-feature SHAP values of one prediction plus the baseline they are relative to.
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub expected_value: f64,
    pub contributions: Vec<f64>,
}

impl Explanation {
    pub fn margin(&self) -> f64 {
        self.expected_value + self.contributions.iter().sum::<f64>()
    }
}

pub fn explain(booster: &Booster, x: &[f64]) -> Explanation {
    let mut phi = vec![0.0; booster.num_features()];
    for tree in &booster.trees {
        tree_shap(tree, x, &mut phi);
    }
    Explanation {
        expected_value: booster.expected_value(),
        contributions: phi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::gbdt::{BoosterParams, Dataset};

    fn stump() -> Tree {
        Tree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 0.5,
                    default_left: true,
                    left: 1,
                    right: 2,
                    gain: 1.0,
                    cover: 100.0,
                },
                Node::Leaf {
                    value: -1.0,
                    cover: 25.0,
                },
                Node::Leaf {
                    value: 3.0,
                    cover: 75.0,
                },
            ],
        }
    }

    #[test]
    fn test_stump_contribution() {
        let tree = stump();
        // expected value = 0.25 * -1 + 0.75 * 3 = 2.0
        assert!((tree.expected_value() - 2.0).abs() < 1e-12);

        let mut phi = vec![0.0; 2];
        tree_shap(&tree, &[0.0, 9.0], &mut phi);
        assert!((phi[0] - -3.0).abs() < 1e-12);
        assert_eq!(phi[1], 0.0);

        let mut phi = vec![0.0; 2];
        tree_shap(&tree, &[1.0, 9.0], &mut phi);
        assert!((phi[0] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_interaction_tree_splits_credit() {
        // f0 <= 0.5 ? (f1 <= 0.5 ? 0 : 0) : (f1 <= 0.5 ? 0 : 4), uniform covers
        let tree = Tree {
            nodes: vec![
                Node::Split { feature: 0, threshold: 0.5, default_left: true, left: 1, right: 2, gain: 1.0, cover: 4.0 },
                Node::Leaf { value: 0.0, cover: 2.0 },
                Node::Split { feature: 1, threshold: 0.5, default_left: true, left: 3, right: 4, gain: 1.0, cover: 2.0 },
                Node::Leaf { value: 0.0, cover: 1.0 },
                Node::Leaf { value: 4.0, cover: 1.0 },
            ],
        };
        let mut phi = vec![0.0; 2];
        tree_shap(&tree, &[1.0, 1.0], &mut phi);
        // f(x) = 4, E[f] = 1, AND-like interaction splits credit evenly
        assert!((phi[0] - 1.5).abs() < 1e-12, "phi0 = {}", phi[0]);
        assert!((phi[1] - 1.5).abs() < 1e-12, "phi1 = {}", phi[1]);
    }

    #[test]
    fn test_contributions_add_up_to_margin() {
        let features: Vec<Vec<f64>> = (0..600)
            .map(|i| {
                let a = (i % 17) as f64;
                let b = ((i * 7) % 13) as f64;
                let c = if i % 5 == 0 { f64::NAN } else { ((i * 3) % 10) as f64 };
                vec![a, b, c]
            })
            .collect();
        let labels = features
            .iter()
            .map(|r| u8::from(r[0] + r[1] > 14.0 || r[2].is_nan()))
            .collect();
        let data = Dataset::new(features, labels).unwrap();
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let params = BoosterParams {
            num_trees: 15,
            max_depth: 4,
            learning_rate: 0.2,
            min_samples_leaf: 10,
            early_stopping_rounds: 0,
            ..BoosterParams::default()
        };
        let booster = Booster::fit(&data, None, &names, &params).unwrap();

        for row in data.features.iter().take(50) {
            let explanation = explain(&booster, row);
            let margin = booster.predict_margin(row);
            assert!(
                (explanation.margin() - margin).abs() < 1e-9,
                "{} vs {}",
                explanation.margin(),
                margin
            );
        }
    }
}
