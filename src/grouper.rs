//! The bucket-seeded, iterative soft clustering procedure that turns a
//! flat pool of observations into probability-weighted groups. Pure and
//! non-blocking: it never touches the store once the pool is loaded.

use std::collections::HashMap;

use statrs::distribution::{Continuous, Normal};

use crate::config::EngineConfig;
use crate::model::{Group, Member, Observation, SyncState};

/// Floor below which a cluster's normalizer has underflowed to zero,
/// triggering the uniform-probability fallback.
const WEIGHT_EPSILON: f64 = 1e-300;
/// Tolerance for treating projected times within a cluster as identical
/// (all-equal mu yields uniform probabilities).
const MU_EQUALITY_EPSILON: f64 = 1e-9;
/// Convergence tolerance for center refinement.
const CONVERGENCE_EPSILON: f64 = 1e-9;

/// One sensor's contribution to a cluster, carrying enough of the
/// original observation (`t_local`, `sigma`) for the orchestrator to
/// later replay through the time-sync filter. The public
/// [`Group`]/[`Member`] types deliberately don't carry this: they are
/// the output-shaped, never-persisted result.
#[derive(Debug, Clone)]
pub struct Assignment {
    pub sensor_id: String,
    pub t_local: f64,
    pub sigma: f64,
    pub probability: f64,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub t_global: f64,
    pub assignments: Vec<Assignment>,
}

impl Cluster {
    pub fn into_group(self) -> Group {
        Group {
            t_global: self.t_global,
            members: self
                .assignments
                .into_iter()
                .map(|a| Member {
                    sensor_id: a.sensor_id,
                    probability: a.probability,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
struct Projected {
    sensor_id: String,
    t_local: f64,
    mu: f64,
    sigma: f64,
    bucket: i64,
}

/// Run one grouping pass over the current live pool. Observations
/// missing a sync state inherit `SyncState::default()`.
pub fn group(observations: &[Observation], sync_states: &HashMap<String, SyncState>, cfg: &EngineConfig) -> Vec<Cluster> {
    let bucket_size_seconds = cfg.bucket_size_ms as f64 / 1000.0;

    let mut projected: Vec<Projected> = observations
        .iter()
        .map(|obs| {
            let state = sync_states.get(&obs.sensor_id).copied().unwrap_or_default();
            let mu = obs.t_local * state.drift + state.offset_mean;
            let variance = obs.sigma * obs.sigma + state.offset_var;
            let sigma = variance.sqrt();
            Projected {
                sensor_id: obs.sensor_id.clone(),
                t_local: obs.t_local,
                mu,
                sigma,
                bucket: (mu / bucket_size_seconds).floor() as i64,
            }
        })
        .collect();

    projected.sort_by(|a, b| a.bucket.cmp(&b.bucket).then(a.mu.total_cmp(&b.mu)));

    let mut clusters = Vec::new();
    for candidate in bucketize(projected) {
        clusters.extend(process_candidate(candidate, 0, cfg));
    }

    clusters.sort_by(|a, b| a.t_global.total_cmp(&b.t_global));
    for cluster in &mut clusters {
        cluster.assignments.sort_by(|a, b| {
            b.probability
                .total_cmp(&a.probability)
                .then_with(|| a.sensor_id.cmp(&b.sensor_id))
        });
    }
    clusters
}

/// Split the bucket-sorted observations into maximal runs whose buckets
/// differ by at most 1 from their predecessor.
fn bucketize(sorted: Vec<Projected>) -> Vec<Vec<Projected>> {
    let mut candidates: Vec<Vec<Projected>> = Vec::new();
    for item in sorted {
        match candidates.last_mut() {
            Some(run) if item.bucket - run.last().expect("non-empty run").bucket <= 1 => run.push(item),
            _ => candidates.push(vec![item]),
        }
    }
    candidates
}

/// Recursively converge a candidate cluster's center and soft
/// assignment, then split if its RMS deviation exceeds
/// `k * median(sigma)`, up to `max_split_depth`.
fn process_candidate(members: Vec<Projected>, depth: u32, cfg: &EngineConfig) -> Vec<Cluster> {
    if members.len() == 1 {
        let only = &members[0];
        return vec![Cluster {
            t_global: only.mu,
            assignments: vec![Assignment {
                sensor_id: only.sensor_id.clone(),
                t_local: only.t_local,
                sigma: only.sigma,
                probability: 1.0,
            }],
        }];
    }

    let (t_hat, probabilities) = converge(&members, cfg.max_iter);

    let rms = (members
        .iter()
        .zip(&probabilities)
        .map(|(m, p)| p * (m.mu - t_hat).powi(2))
        .sum::<f64>())
    .sqrt();
    let median_sigma = median(members.iter().map(|m| m.sigma).collect());

    if depth < cfg.max_split_depth && rms > cfg.split_k * median_sigma {
        if let Some((left, right)) = split(&members, t_hat) {
            let mut out = process_candidate(left, depth + 1, cfg);
            out.extend(process_candidate(right, depth + 1, cfg));
            return out;
        }
    }

    vec![Cluster {
        t_global: t_hat,
        assignments: members
            .into_iter()
            .zip(probabilities)
            .map(|(m, p)| Assignment {
                sensor_id: m.sensor_id,
                t_local: m.t_local,
                sigma: m.sigma,
                probability: p,
            })
            .collect(),
    }]
}

/// Steps 2–5: inverse-variance-weighted center init, then alternate
/// soft assignment and center refinement until convergence or
/// `max_iter`.
fn converge(members: &[Projected], max_iter: u32) -> (f64, Vec<f64>) {
    let mut t_hat = weighted_mean(members, |_| 1.0);

    let mu_min = members.iter().map(|m| m.mu).fold(f64::INFINITY, f64::min);
    let mu_max = members.iter().map(|m| m.mu).fold(f64::NEG_INFINITY, f64::max);
    if mu_max - mu_min <= MU_EQUALITY_EPSILON {
        let uniform = 1.0 / members.len() as f64;
        return (t_hat, vec![uniform; members.len()]);
    }

    let mut probabilities = vec![1.0 / members.len() as f64; members.len()];
    for _ in 0..max_iter {
        probabilities = soft_assign(members, t_hat);
        let refined = weighted_mean(members, |i| probabilities[i]);
        let delta = (refined - t_hat).abs();
        t_hat = refined;
        if delta < CONVERGENCE_EPSILON {
            break;
        }
    }
    (t_hat, probabilities)
}

/// Step 3: unnormalised Gaussian weights, normalised within the
/// cluster; falls back to uniform probabilities if the normalizer
/// underflows to zero.
fn soft_assign(members: &[Projected], t_hat: f64) -> Vec<f64> {
    let weights: Vec<f64> = members
        .iter()
        .map(|m| {
            Normal::new(t_hat, m.sigma)
                .map(|dist| dist.pdf(m.mu))
                .unwrap_or(0.0)
        })
        .collect();
    let total: f64 = weights.iter().sum();
    if total <= WEIGHT_EPSILON || !total.is_finite() {
        let uniform = 1.0 / members.len() as f64;
        vec![uniform; members.len()]
    } else {
        weights.into_iter().map(|w| w / total).collect()
    }
}

/// Step 4 / initial center (step 2): `Σ wᵢ·μᵢ/σᵢ² ÷ Σ wᵢ/σᵢ²`.
fn weighted_mean(members: &[Projected], weight_of: impl Fn(usize) -> f64) -> f64 {
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, m) in members.iter().enumerate() {
        let inv_var = 1.0 / (m.sigma * m.sigma);
        let w = weight_of(i) * inv_var;
        numerator += w * m.mu;
        denominator += w;
    }
    numerator / denominator
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Seed two centers (the current center and the observation furthest
/// from it), assign every member to the nearer seed, and hand the two
/// partitions back for independent reconvergence. Returns `None` if the
/// partition would leave either side empty (degenerate: the candidate
/// is kept whole instead).
fn split(members: &[Projected], t_hat: f64) -> Option<(Vec<Projected>, Vec<Projected>)> {
    let farthest_mu = members
        .iter()
        .max_by(|a, b| (a.mu - t_hat).abs().total_cmp(&(b.mu - t_hat).abs()))?
        .mu;

    let mut near = Vec::new();
    let mut far = Vec::new();
    for m in members {
        if (m.mu - t_hat).abs() <= (m.mu - farthest_mu).abs() {
            near.push(m.clone());
        } else {
            far.push(m.clone());
        }
    }

    if near.is_empty() || far.is_empty() {
        None
    } else {
        Some((near, far))
    }
}
