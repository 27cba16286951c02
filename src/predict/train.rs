//! Synthetic-data training for the linear and forest cost predictors.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::Serialize;
use tracing::info;

use super::{
    write_json, ForestModel, LinearModel, ModelArtifacts, RegressionTree, TreeNode, FEATURE_NAMES,
};

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub samples: usize,
    pub seed: u64,
    pub target_weights: LinearModel,
    pub noise_std: f64,
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            samples: 500,
            seed: 42,
            target_weights: LinearModel::default(),
            noise_std: 5.0,
            n_trees: 100,
            max_depth: 8,
            min_samples_split: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub features: [f64; 3],
    pub cost: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForestMetadata {
    pub feature_importances: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub linear: LinearModel,
    pub rf: ForestMetadata,
}

#[derive(Debug, Clone)]
pub struct TrainedModels {
    pub linear: LinearModel,
    pub forest: ForestModel,
    pub metadata: ModelMetadata,
}

/// Draws samples around the configured ground-truth weights with Gaussian noise.
pub fn generate_training_data(cfg: &TrainingConfig, rng: &mut StdRng) -> Result<Vec<Sample>> {
    let noise = Normal::new(0.0, cfg.noise_std)
        .with_context(|| format!("invalid noise_std {}", cfg.noise_std))?;
    let w = &cfg.target_weights;
    let samples = (0..cfg.samples)
        .map(|_| {
            let distance = f64::from(rng.gen_range(10_u32..100));
            let traffic = f64::from(rng.gen_range(0_u32..100));
            let quality = f64::from(rng.gen_range(1_u32..10));
            let quality_inv = 11.0 - quality;
            let cost = w.w_distance * distance
                + w.w_traffic * traffic
                + w.w_quality_inv * quality_inv
                + w.intercept
                + noise.sample(&mut *rng);
            Sample {
                features: [distance, traffic, quality_inv],
                cost: (cost * 100.0).round() / 100.0,
            }
        })
        .collect();
    Ok(samples)
}

/// Ordinary least squares with an intercept term.
pub fn fit_linear(samples: &[Sample]) -> Result<LinearModel> {
    if samples.len() < 4 {
        bail!("linear fit needs at least 4 samples, got {}", samples.len());
    }

    // Normal equations over [1, distance, traffic, quality_inv].
    let mut a = [[0.0_f64; 5]; 4];
    for sample in samples {
        let row = [
            1.0,
            sample.features[0],
            sample.features[1],
            sample.features[2],
        ];
        for i in 0..4 {
            for j in 0..4 {
                a[i][j] += row[i] * row[j];
            }
            a[i][4] += row[i] * sample.cost;
        }
    }

    let beta = solve_augmented(a).context("linear fit is singular")?;
    let model = LinearModel {
        intercept: beta[0],
        w_distance: beta[1],
        w_traffic: beta[2],
        w_quality_inv: beta[3],
    };
    model.validate()?;
    Ok(model)
}

fn solve_augmented(mut a: [[f64; 5]; 4]) -> Result<[f64; 4]> {
    let scale = a
        .iter()
        .flat_map(|row| row[..4].iter())
        .fold(0.0_f64, |acc, value| acc.max(value.abs()));
    let tolerance = scale.max(1.0) * 1e-10;
    for col in 0..4 {
        let pivot = (col..4)
            .max_by(|x, y| a[*x][col].abs().total_cmp(&a[*y][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < tolerance {
            bail!("zero pivot in column {col}");
        }
        a.swap(col, pivot);
        for row in 0..4 {
            if row == col {
                continue;
            }
            let factor = a[row][col] / a[col][col];
            for k in col..5 {
                a[row][k] -= factor * a[col][k];
            }
        }
    }
    let mut out = [0.0; 4];
    for (i, value) in out.iter_mut().enumerate() {
        *value = a[i][4] / a[i][i];
    }
    Ok(out)
}

struct TreeBuilder<'a> {
    samples: &'a [Sample],
    max_depth: usize,
    min_samples_split: usize,
    nodes: Vec<TreeNode>,
    importances: [f64; 3],
}

struct SplitChoice {
    feature: usize,
    threshold: f64,
    gain: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl<'a> TreeBuilder<'a> {
    fn build(&mut self, indices: &[usize], depth: usize) -> usize {
        let idx = self.nodes.len();
        let mean = mean_cost(self.samples, indices);

        let split = if depth >= self.max_depth || indices.len() < self.min_samples_split {
            None
        } else {
            self.best_split(indices)
        };

        let Some(split) = split else {
            self.nodes.push(TreeNode::Leaf { value: mean });
            return idx;
        };

        self.importances[split.feature] += split.gain;
        self.nodes.push(TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: 0,
            right: 0,
        });
        let left = self.build(&split.left, depth + 1);
        let right = self.build(&split.right, depth + 1);
        if let Some(TreeNode::Split {
            left: l, right: r, ..
        }) = self.nodes.get_mut(idx)
        {
            *l = left;
            *r = right;
        }
        idx
    }

    fn best_split(&self, indices: &[usize]) -> Option<SplitChoice> {
        if indices.len() < 2 {
            return None;
        }
        let n = indices.len() as f64;
        let total: f64 = indices.iter().map(|i| self.samples[*i].cost).sum();
        let total_sq: f64 = indices
            .iter()
            .map(|i| self.samples[*i].cost * self.samples[*i].cost)
            .sum();
        let parent_sse = total_sq - total * total / n;
        if parent_sse <= 1e-12 {
            return None;
        }

        let mut best: Option<(usize, f64, f64)> = None;
        for feature in 0..3 {
            let mut order = indices.to_vec();
            order.sort_by(|a, b| {
                self.samples[*a].features[feature].total_cmp(&self.samples[*b].features[feature])
            });

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for pos in 0..order.len() - 1 {
                let y = self.samples[order[pos]].cost;
                left_sum += y;
                left_sq += y * y;

                let here = self.samples[order[pos]].features[feature];
                let next = self.samples[order[pos + 1]].features[feature];
                if next <= here {
                    continue;
                }

                let left_n = (pos + 1) as f64;
                let right_n = n - left_n;
                let right_sum = total - left_sum;
                let right_sq = total_sq - left_sq;
                let children_sse = (left_sq - left_sum * left_sum / left_n)
                    + (right_sq - right_sum * right_sum / right_n);
                let gain = parent_sse - children_sse;
                if best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, (here + next) / 2.0, gain));
                }
            }
        }

        let (feature, threshold, gain) = best?;
        if gain <= 0.0 {
            return None;
        }
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|i| self.samples[*i].features[feature] <= threshold);
        Some(SplitChoice {
            feature,
            threshold,
            gain,
            left,
            right,
        })
    }
}

fn mean_cost(samples: &[Sample], indices: &[usize]) -> f64 {
    if indices.is_empty() {
        return 0.0;
    }
    indices.iter().map(|i| samples[*i].cost).sum::<f64>() / indices.len() as f64
}

/// Bagged CART regression trees. Returns the forest and normalized
/// impurity-decrease feature importances.
pub fn fit_forest(
    samples: &[Sample],
    cfg: &TrainingConfig,
    rng: &mut StdRng,
) -> Result<(ForestModel, [f64; 3])> {
    if samples.is_empty() {
        bail!("forest fit needs at least one sample");
    }
    if cfg.n_trees == 0 {
        bail!("forest fit needs at least one tree");
    }

    let mut trees = Vec::with_capacity(cfg.n_trees);
    let mut importances = [0.0; 3];
    for _ in 0..cfg.n_trees {
        let bootstrap: Vec<usize> = (0..samples.len())
            .map(|_| rng.gen_range(0..samples.len()))
            .collect();
        let mut builder = TreeBuilder {
            samples,
            max_depth: cfg.max_depth,
            min_samples_split: cfg.min_samples_split.max(2),
            nodes: Vec::new(),
            importances: [0.0; 3],
        };
        builder.build(&bootstrap, 0);

        let tree_total: f64 = builder.importances.iter().sum();
        if tree_total > 0.0 {
            for (acc, value) in importances.iter_mut().zip(builder.importances) {
                *acc += value / tree_total;
            }
        }
        trees.push(RegressionTree {
            nodes: builder.nodes,
        });
    }

    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        for value in &mut importances {
            *value /= total;
        }
    }

    let forest = ForestModel { trees };
    forest.validate()?;
    Ok((forest, importances))
}

pub fn train(cfg: &TrainingConfig) -> Result<TrainedModels> {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    info!("generating {} synthetic samples (seed={})", cfg.samples, cfg.seed);
    let samples = generate_training_data(cfg, &mut rng)?;

    info!("training linear regression model");
    let linear = fit_linear(&samples)?;

    info!("training random forest model: trees={}", cfg.n_trees);
    let (forest, importances) = fit_forest(&samples, cfg, &mut rng)?;

    let feature_importances = FEATURE_NAMES
        .iter()
        .zip(importances)
        .map(|(name, value)| ((*name).to_string(), value))
        .collect();

    Ok(TrainedModels {
        linear,
        metadata: ModelMetadata {
            linear,
            rf: ForestMetadata {
                feature_importances,
            },
        },
        forest,
    })
}

pub fn export(models: &TrainedModels, artifacts: &ModelArtifacts) -> Result<()> {
    info!("exporting models to {}", artifacts.dir.display());
    write_json(&artifacts.linear, &models.linear)?;
    write_json(&artifacts.forest, &models.forest)?;
    write_json(&artifacts.metadata, &models.metadata)?;
    info!("model metadata exported");
    Ok(())
}
