//! Density-based clustering of scan pixels in (value, longitude, latitude, time) space.
//!
//! Neighbour queries go through a `kiddo` KD-tree and, with the `parallel`
//! feature, run on `rayon`; core points are merged with a union-find. Labels
//! follow the usual DBSCAN convention: border points join the cluster of their
//! nearest core neighbour, everything else is noise.

use crate::config::ClusteringParams;
use crate::types::{EmissionsError, EmissionsResult, RawFieldSet};
use kiddo::{ImmutableKdTree, SquaredEuclidean};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of feature columns: value, longitude, latitude, delta time
pub const FEATURE_COUNT: usize = 4;

pub type FeatureRow = [f64; FEATURE_COUNT];

/// Column treatment before clustering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeatureScaling {
    /// Native units. The delta-time column (milliseconds) dominates distances.
    Raw,
    /// Zero mean, unit variance per column
    #[default]
    Standardize,
}

/// Cluster label of one valid pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClusterAssignment {
    pub line: usize,
    pub pixel: usize,
    /// `None` for noise
    pub cluster: Option<usize>,
}

/// Outcome of a clustering pass
#[derive(Debug, Clone, Serialize)]
pub struct ClusteringReport {
    /// One entry per valid pixel, row-major
    pub assignments: Vec<ClusterAssignment>,
    /// Clusters found, noise excluded
    pub cluster_count: usize,
    pub noise_count: usize,
    /// Mean silhouette coefficient of the clustered points
    pub silhouette: Option<f64>,
}

impl ClusteringReport {
    /// Labels with `-1` marking noise
    pub fn labels(&self) -> Vec<i64> {
        self.assignments
            .iter()
            .map(|a| a.cluster.map(|c| c as i64).unwrap_or(-1))
            .collect()
    }
}

/// Union-find with path halving
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, x: usize, y: usize) {
        let (rx, ry) = (self.find(x), self.find(y));
        if rx != ry {
            let (small, large) = if rx < ry { (rx, ry) } else { (ry, rx) };
            self.parent[large] = small;
        }
    }
}

/// Build feature rows for every valid pixel, row-major, with their positions
pub fn feature_matrix(fields: &RawFieldSet) -> (Vec<FeatureRow>, Vec<(usize, usize)>) {
    let mut rows = Vec::with_capacity(fields.valid_count());
    let mut positions = Vec::with_capacity(fields.valid_count());

    for (idx, &valid) in fields.valid.indexed_iter() {
        if !valid {
            continue;
        }
        rows.push([
            fields.value[idx],
            fields.longitude[idx],
            fields.latitude[idx],
            fields.delta_time[idx.0],
        ]);
        positions.push(idx);
    }
    (rows, positions)
}

/// Z-score every column in place; constant columns become zero
pub fn standardize(rows: &mut [FeatureRow]) {
    if rows.is_empty() {
        return;
    }
    let n = rows.len() as f64;
    for col in 0..FEATURE_COUNT {
        let mean = rows.iter().map(|r| r[col]).sum::<f64>() / n;
        let variance = rows.iter().map(|r| (r[col] - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        for row in rows.iter_mut() {
            row[col] = if std > 0.0 { (row[col] - mean) / std } else { 0.0 };
        }
    }
}

/// DBSCAN over feature rows.
///
/// `min_samples` counts the point itself. Cluster ids are numbered in order of
/// the first core point of each cluster.
pub fn dbscan(rows: &[FeatureRow], eps: f64, min_samples: usize) -> Vec<Option<usize>> {
    let n = rows.len();
    if n == 0 {
        return Vec::new();
    }

    let tree: ImmutableKdTree<f64, FEATURE_COUNT> = ImmutableKdTree::new_from_slice(rows);
    let eps_sq = eps * eps;

    let query = |row: &FeatureRow| -> Vec<usize> {
        tree.within::<SquaredEuclidean>(row, eps_sq)
            .iter()
            .map(|nn| nn.item as usize)
            .collect()
    };

    #[cfg(feature = "parallel")]
    let neighbors: Vec<Vec<usize>> = rows.par_iter().map(query).collect();

    #[cfg(not(feature = "parallel"))]
    let neighbors: Vec<Vec<usize>> = rows.iter().map(query).collect();

    let is_core: Vec<bool> = neighbors
        .iter()
        .map(|neigh| neigh.len() >= min_samples)
        .collect();

    let mut sets = DisjointSet::new(n);
    for i in 0..n {
        if is_core[i] {
            for &j in &neighbors[i] {
                if is_core[j] {
                    sets.union(i, j);
                }
            }
        }
    }

    let mut root_to_cluster: HashMap<usize, usize> = HashMap::new();
    let mut labels = vec![None; n];
    for i in 0..n {
        if is_core[i] {
            let root = sets.find(i);
            let next = root_to_cluster.len();
            labels[i] = Some(*root_to_cluster.entry(root).or_insert(next));
        }
    }

    for i in 0..n {
        if is_core[i] {
            continue;
        }
        if let Some(&j) = neighbors[i].iter().find(|&&j| is_core[j]) {
            labels[i] = labels[j];
        }
    }

    labels
}

fn distance(a: &FeatureRow, b: &FeatureRow) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Mean silhouette coefficient over labelled rows, noise skipped.
///
/// At most `max_samples` points are used, taken at a fixed stride. Returns
/// `None` when fewer than two clusters remain.
pub fn silhouette_score(
    rows: &[FeatureRow],
    labels: &[Option<usize>],
    max_samples: usize,
) -> Option<f64> {
    let clustered: Vec<(usize, usize)> = labels
        .iter()
        .enumerate()
        .filter_map(|(i, label)| label.map(|c| (i, c)))
        .collect();
    if clustered.is_empty() {
        return None;
    }

    let stride = clustered.len().div_ceil(max_samples.max(1));
    let sample: Vec<(usize, usize)> = clustered.into_iter().step_by(stride).collect();

    let mut cluster_ids: Vec<usize> = sample.iter().map(|&(_, c)| c).collect();
    cluster_ids.sort_unstable();
    cluster_ids.dedup();
    if cluster_ids.len() < 2 {
        return None;
    }
    let slot: HashMap<usize, usize> = cluster_ids
        .iter()
        .enumerate()
        .map(|(slot, &c)| (c, slot))
        .collect();
    let mut sizes = vec![0usize; cluster_ids.len()];
    for &(_, c) in &sample {
        sizes[slot[&c]] += 1;
    }

    let score = |&(i, own): &(usize, usize)| -> f64 {
        let own_slot = slot[&own];
        if sizes[own_slot] < 2 {
            return 0.0;
        }
        let mut sums = vec![0.0f64; cluster_ids.len()];
        for &(j, c) in &sample {
            if j != i {
                sums[slot[&c]] += distance(&rows[i], &rows[j]);
            }
        }
        let a = sums[own_slot] / (sizes[own_slot] - 1) as f64;
        let b = (0..cluster_ids.len())
            .filter(|&s| s != own_slot)
            .map(|s| sums[s] / sizes[s] as f64)
            .fold(f64::INFINITY, f64::min);
        let denom = a.max(b);
        if denom > 0.0 {
            (b - a) / denom
        } else {
            0.0
        }
    };

    #[cfg(feature = "parallel")]
    let total: f64 = sample.par_iter().map(score).sum();

    #[cfg(not(feature = "parallel"))]
    let total: f64 = sample.iter().map(score).sum();

    Some(total / sample.len() as f64)
}

/// Spatio-temporal-value cluster detection over a full scan
#[derive(Debug, Clone)]
pub struct ClusterDetector {
    params: ClusteringParams,
}

impl ClusterDetector {
    pub fn new(params: ClusteringParams) -> EmissionsResult<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ClusteringParams {
        &self.params
    }

    /// Cluster every valid pixel of the scan; no quality filtering is applied
    pub fn detect(&self, fields: &RawFieldSet) -> EmissionsResult<ClusteringReport> {
        let (mut rows, positions) = feature_matrix(fields);
        if rows.len() < self.params.min_samples {
            return Err(EmissionsError::InsufficientData {
                found: rows.len(),
                required: self.params.min_samples,
            });
        }

        log::info!(
            "Clustering {} observations (eps={}, min_samples={}, scaling={:?})",
            rows.len(),
            self.params.eps,
            self.params.min_samples,
            self.params.scaling
        );
        let start_time = std::time::Instant::now();

        if self.params.scaling == FeatureScaling::Standardize {
            standardize(&mut rows);
        }

        let labels = dbscan(&rows, self.params.eps, self.params.min_samples);
        let cluster_count = labels.iter().flatten().max().map_or(0, |&max| max + 1);
        let noise_count = labels.iter().filter(|l| l.is_none()).count();
        let silhouette = silhouette_score(&rows, &labels, self.params.max_silhouette_samples);

        log::info!("Estimated number of clusters: {}", cluster_count);
        log::info!("Estimated number of noise points: {}", noise_count);
        match silhouette {
            Some(score) => log::info!("Silhouette coefficient: {:.3}", score),
            None => log::info!("Silhouette coefficient undefined for fewer than two clusters"),
        }
        log::debug!("Clustering took {:?}", start_time.elapsed());

        let assignments = positions
            .into_iter()
            .zip(labels)
            .map(|((line, pixel), cluster)| ClusterAssignment { line, pixel, cluster })
            .collect();

        Ok(ClusteringReport {
            assignments,
            cluster_count,
            noise_count,
            silhouette,
        })
    }
}
