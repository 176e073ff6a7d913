//! CART regression tree for the boosting learner.
//!
//! Splits minimise weighted squared error. Leaves are addressable so that a
//! boosting round can overwrite them with its own step.

use ndarray::{Array2, ArrayView1};

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    nodes: Vec<Node>,
    importance: Vec<f64>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Stats {
    weight: f64,
    weighted_sum: f64,
    weighted_sq_sum: f64,
}

impl Stats {
    fn add(&mut self, target: f64, weight: f64) {
        self.weight += weight;
        self.weighted_sum += weight * target;
        self.weighted_sq_sum += weight * target * target;
    }

    fn minus(&self, other: &Stats) -> Stats {
        Stats {
            weight: self.weight - other.weight,
            weighted_sum: self.weighted_sum - other.weighted_sum,
            weighted_sq_sum: self.weighted_sq_sum - other.weighted_sq_sum,
        }
    }

    fn mean(&self) -> f64 {
        if self.weight > 0.0 {
            self.weighted_sum / self.weight
        } else {
            0.0
        }
    }

    fn sse(&self) -> f64 {
        if self.weight <= 0.0 {
            return 0.0;
        }
        (self.weighted_sq_sum - self.weighted_sum * self.weighted_sum / self.weight).max(0.0)
    }
}

struct Split {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct Builder<'a> {
    features: &'a Array2<f64>,
    targets: &'a [f64],
    weights: &'a [f64],
    params: TreeParams,
    nodes: Vec<Node>,
    importance: Vec<f64>,
}

impl RegressionTree {
    /// Grows a tree over the rows with positive weight.
    pub fn fit(
        features: &Array2<f64>,
        targets: &[f64],
        weights: &[f64],
        params: TreeParams,
    ) -> Self {
        let rows: Vec<usize> = (0..targets.len()).filter(|&i| weights[i] > 0.0).collect();
        let mut builder = Builder {
            features,
            targets,
            weights,
            params,
            nodes: Vec::new(),
            importance: vec![0.0; features.ncols()],
        };
        builder.grow(rows, 0);

        RegressionTree {
            nodes: builder.nodes,
            importance: builder.importance,
        }
    }

    pub fn predict_row(&self, row: ArrayView1<f64>) -> f64 {
        match self.nodes.get(self.leaf_index(row)) {
            Some(Node::Leaf { value }) => *value,
            _ => 0.0,
        }
    }

    pub fn leaf_index(&self, row: ArrayView1<f64>) -> usize {
        let mut current = 0;
        while let Some(Node::Split {
            feature,
            threshold,
            left,
            right,
        }) = self.nodes.get(current)
        {
            current = if row[*feature] <= *threshold {
                *left
            } else {
                *right
            };
        }
        current
    }

    pub fn set_leaf_value(&mut self, leaf: usize, new_value: f64) {
        if let Some(Node::Leaf { value }) = self.nodes.get_mut(leaf) {
            *value = new_value;
        }
    }

    /// Total squared-error reduction contributed by each feature.
    pub fn feature_importance(&self) -> &[f64] {
        &self.importance
    }

    #[cfg(test)]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

impl Builder<'_> {
    fn grow(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let mut stats = Stats::default();
        for &i in &rows {
            stats.add(self.targets[i], self.weights[i]);
        }

        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            value: stats.mean(),
        });

        if depth >= self.params.max_depth
            || rows.len() < self.params.min_samples_split
            || stats.sse() <= f64::EPSILON
        {
            return node_id;
        }

        let Some(split) = self.best_split(&rows, &stats) else {
            return node_id;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&i| self.features[(i, split.feature)] <= split.threshold);
        self.importance[split.feature] += split.gain;

        let left = self.grow(left_rows, depth + 1);
        let right = self.grow(right_rows, depth + 1);
        self.nodes[node_id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    fn best_split(&self, rows: &[usize], parent: &Stats) -> Option<Split> {

        let min_leaf = self.params.min_samples_leaf.max(1);
        let parent_sse = parent.sse();
        let mut best: Option<Split> = None;
        let mut sorted = rows.to_vec();

        for feature in 0..self.features.ncols() {
            sorted.sort_by(|a, b| {
                self.features[(*a, feature)].total_cmp(&self.features[(*b, feature)])
            });

            let mut left = Stats::default();
            for pos in 0..sorted.len().saturating_sub(1) {
                let i = sorted[pos];
                left.add(self.targets[i], self.weights[i]);

                let current = self.features[(i, feature)];
                let next = self.features[(sorted[pos + 1], feature)];
                if current == next {
                    continue;
                }
                let left_count = pos + 1;
                if left_count < min_leaf || sorted.len() - left_count < min_leaf {
                    continue;
                }

                let right = parent.minus(&left);
                let gain = parent_sse - left.sse() - right.sse();
                let improves = best.as_ref().map_or(true, |b| gain > b.gain + 1e-12);
                if gain > 1e-12 && improves {
                    best = Some(Split {
                        feature,
                        threshold: (current + next) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(max_depth: usize) -> TreeParams {
        TreeParams {
            max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
        }
    }

    #[test]
    fn separates_a_threshold() {
        let features = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let targets = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let weights = [1.0; 6];
        let tree = RegressionTree::fit(&features, &targets, &weights, params(3));

        assert_eq!(tree.predict_row(array![2.5].view()), 0.0);
        assert_eq!(tree.predict_row(array![11.5].view()), 1.0);
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn importance_goes_to_the_useful_feature() {
        let features = array![[5.0, 1.0], [5.0, 2.0], [5.0, 8.0], [5.0, 9.0]];
        let targets = [0.0, 0.0, 1.0, 1.0];
        let weights = [1.0; 4];
        let tree = RegressionTree::fit(&features, &targets, &weights, params(2));

        assert_eq!(tree.feature_importance()[0], 0.0);
        assert!(tree.feature_importance()[1] > 0.0);
    }

    #[test]
    fn depth_zero_is_a_weighted_mean() {
        let features = array![[1.0], [2.0]];
        let targets = [0.0, 1.0];
        let weights = [1.0, 3.0];
        let tree = RegressionTree::fit(&features, &targets, &weights, params(0));
        assert!((tree.predict_row(array![1.0].view()) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn leaf_values_can_be_replaced() {
        let features = array![[1.0], [9.0]];
        let targets = [0.0, 1.0];
        let weights = [1.0; 2];
        let mut tree = RegressionTree::fit(&features, &targets, &weights, params(1));

        let leaf = tree.leaf_index(array![9.0].view());
        tree.set_leaf_value(leaf, 4.2);
        assert_eq!(tree.predict_row(array![9.0].view()), 4.2);
    }

    #[test]
    fn respects_min_samples_leaf() {
        let features = array![[1.0], [2.0], [3.0], [4.0]];
        let targets = [1.0, 0.0, 0.0, 0.0];
        let weights = [1.0; 4];
        let tree = RegressionTree::fit(
            &features,
            &targets,
            &weights,
            TreeParams {
                min_samples_leaf: 2,
                ..params(3)
            },
        );
        // the only legal split puts two rows on each side
        assert!((tree.predict_row(array![1.0].view()) - 0.5).abs() < 1e-12);
    }
}
