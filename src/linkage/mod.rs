
use crate::distance_measure::condensed_index;
use crate::error::{ClusterError, Result};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Criterion used to compute the distance between a merged cluster and the rest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkageMethod {
    Single,
    Complete,
    Average,
    /// WPGMA: the new distance is the plain mean of the two merged distances.
    Weighted,
    Ward,
}

impl Default for LinkageMethod {
    fn default() -> Self {
        LinkageMethod::Ward
    }
}

impl FromStr for LinkageMethod {
    type Err = ClusterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(Self::Single),
            "complete" => Ok(Self::Complete),
            "average" => Ok(Self::Average),
            "weighted" => Ok(Self::Weighted),
            "ward" => Ok(Self::Ward),
            _ => Err(ClusterError::estimator("linkage", format!("unknown linkage method {}", s))),
        }
    }
}

impl LinkageMethod {
    /// Lance-Williams update of `d(a ∪ b, k)`.
    fn update(&self, d_ak: f64, d_bk: f64, d_ab: f64, n_a: usize, n_b: usize, n_k: usize) -> f64 {
        match self {
            Self::Single => d_ak.min(d_bk),
            Self::Complete => d_ak.max(d_bk),
            Self::Average => (n_a as f64 * d_ak + n_b as f64 * d_bk) / (n_a + n_b) as f64,
            Self::Weighted => 0.5 * (d_ak + d_bk),
            Self::Ward => {
                let (n_a, n_b, n_k) = (n_a as f64, n_b as f64, n_k as f64);
                let t = n_a + n_b + n_k;
                (((n_a + n_k) * d_ak * d_ak + (n_b + n_k) * d_bk * d_bk - n_k * d_ab * d_ab) / t)
                    .max(0.0)
                    .sqrt()
            }
        }
    }
}

/// Agglomerative hierarchical clustering over a condensed distance vector of `n` points.
///
/// Returns the `(n - 1) x 4` linkage matrix. Row `s` merges clusters `[s, 0]` and
/// `[s, 1]` (the smaller id first) at distance `[s, 2]` into a cluster of `[s, 3]`
/// points, which gets the id `n + s`. Ids below `n` are the original points.
///
/// Each step merges the closest pair of active clusters; ties go to the first pair
/// in row-major order of the cluster slots, so the result only depends on the
/// input order.
pub fn linkage(condensed: &[f64], n: usize, method: LinkageMethod) -> Result<Array2<f64>> {
    if condensed.len() != n * n.saturating_sub(1) / 2 {
        return Err(ClusterError::estimator(
            "linkage",
            format!("{} distances do not describe {} points", condensed.len(), n),
        ));
    }
    if condensed.iter().any(|d| !d.is_finite()) {
        return Err(ClusterError::estimator("linkage", "distances must be finite"));
    }

    let mut dist = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = condensed[condensed_index(n, i, j)];
            dist[[i, j]] = d;
            dist[[j, i]] = d;
        }
    }

    let mut active = vec![true; n];
    let mut ids: Vec<usize> = (0..n).collect();
    let mut sizes = vec![1usize; n];

    // nearest active slot to the right of each slot
    let mut nearest = vec![usize::MAX; n];
    let mut nearest_dist = vec![f64::INFINITY; n];
    for i in 0..n {
        refresh_nearest(i, &dist, &active, &mut nearest, &mut nearest_dist);
    }

    let mut z = Array2::<f64>::zeros((n.saturating_sub(1), 4));
    for step in 0..n.saturating_sub(1) {
        let mut a = usize::MAX;
        let mut best = f64::INFINITY;
        for i in 0..n {
            if active[i] && nearest[i] != usize::MAX && nearest_dist[i] < best {
                best = nearest_dist[i];
                a = i;
            }
        }
        if a == usize::MAX {
            return Err(ClusterError::estimator("linkage", "no pair left to merge"));
        }
        let b = nearest[a];

        let (low, high) = if ids[a] < ids[b] { (ids[a], ids[b]) } else { (ids[b], ids[a]) };
        z[[step, 0]] = low as f64;
        z[[step, 1]] = high as f64;
        z[[step, 2]] = best;
        z[[step, 3]] = (sizes[a] + sizes[b]) as f64;

        for k in 0..n {
            if !active[k] || k == a || k == b {
                continue;
            }
            let d = method.update(dist[[a, k]], dist[[b, k]], best, sizes[a], sizes[b], sizes[k]);
            dist[[a, k]] = d;
            dist[[k, a]] = d;
        }

        active[b] = false;
        sizes[a] += sizes[b];
        ids[a] = n + step;

        for k in 0..n {
            if !active[k] {
                continue;
            }
            if k == a || nearest[k] == a || nearest[k] == b {
                refresh_nearest(k, &dist, &active, &mut nearest, &mut nearest_dist);
            } else if k < a {
                let d = dist[[k, a]];
                if d < nearest_dist[k] || (d == nearest_dist[k] && a < nearest[k]) {
                    nearest[k] = a;
                    nearest_dist[k] = d;
                }
            }
        }
    }

    Ok(z)
}

fn refresh_nearest(i: usize, dist: &Array2<f64>, active: &[bool], nearest: &mut [usize], nearest_dist: &mut [f64]) {
    nearest[i] = usize::MAX;
    nearest_dist[i] = f64::INFINITY;
    for j in (i + 1)..active.len() {
        if active[j] && dist[[i, j]] < nearest_dist[i] {
            nearest[i] = j;
            nearest_dist[i] = dist[[i, j]];
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub(crate) fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    pub(crate) fn union(&mut self, a: usize, b: usize) -> usize {
        let (mut big, mut small) = (self.find(a), self.find(b));
        if big == small {
            return big;
        }
        if self.size[big] < self.size[small] {
            std::mem::swap(&mut big, &mut small);
        }
        self.parent[small] = big;
        self.size[big] += self.size[small];
        big
    }
}

/// Flat clustering into `k` clusters by replaying the first `n - k` merges.
///
/// Labels are numbered by first appearance in point order.
pub fn cut_tree(z: ArrayView2<f64>, n: usize, k: usize) -> Result<Vec<usize>> {
    if k == 0 || k > n {
        return Err(ClusterError::estimator(
            "linkage",
            format!("cannot cut {} points into {} clusters", n, k),
        ));
    }
    if z.nrows() + 1 != n || z.ncols() < 2 {
        return Err(ClusterError::estimator(
            "linkage",
            format!("linkage of shape {:?} does not belong to {} points", z.dim(), n),
        ));
    }

    let mut uf = UnionFind::new(n);
    // a point belonging to every cluster id
    let mut member: Vec<usize> = (0..n).collect();
    member.reserve(n - 1);
    for (step, row) in z.outer_iter().enumerate() {
        let (a, b) = (row[0] as usize, row[1] as usize);
        if a >= member.len() || b >= member.len() {
            return Err(ClusterError::estimator(
                "linkage",
                format!("merge {} refers to an unknown cluster", step),
            ));
        }
        member.push(member[a]);
        if step < n - k {
            uf.union(member[a], member[b]);
        }
    }

    let mut roots: Vec<usize> = Vec::with_capacity(k);
    let labels = (0..n)
        .map(|i| {
            let root = uf.find(i);
            match roots.iter().position(|&r| r == root) {
                Some(label) => label,
                None => {
                    roots.push(root);
                    roots.len() - 1
                }
            }
        })
        .collect();
    Ok(labels)
}
