use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::ClusteringError;

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansConfig {
    pub n_clusters: usize,
    /// Independent k-means++ initialisations; the lowest-inertia run wins.
    pub n_init: usize,
    pub max_iter: usize,
    /// Stop once the summed squared centroid shift falls below this.
    pub tolerance: f64,
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            n_init: 10,
            max_iter: 300,
            tolerance: 1e-10,
            seed: 42,
        }
    }
}

/// Fitted Lloyd's k-means model over `D`-dimensional points.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeans<const D: usize> {
    centroids: Vec<[f64; D]>,
    inertia: f64,
}

impl<const D: usize> KMeans<D> {
    pub fn fit(points: &[[f64; D]], config: &KMeansConfig) -> Result<Self, ClusteringError> {
        if config.n_clusters == 0 {
            return Err(ClusteringError::NoClusters);
        }
        if points.len() < config.n_clusters {
            return Err(ClusteringError::TooFewPoints {
                points: points.len(),
                clusters: config.n_clusters,
            });
        }
        if let Some(index) = points.iter().position(|p| p.iter().any(|v| !v.is_finite())) {
            return Err(ClusteringError::NonFinite(index));
        }

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut best: Option<Self> = None;
        for _ in 0..config.n_init.max(1) {
            let initial = kmeans_plus_plus(points, config.n_clusters, &mut rng);
            let run = lloyd(points, initial, config.max_iter, config.tolerance);
            if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }
        best.ok_or(ClusteringError::NoClusters)
    }

    /// Builds a model from known centroids without fitting.
    pub fn from_centroids(centroids: Vec<[f64; D]>) -> Self {
        Self {
            centroids,
            inertia: 0.0,
        }
    }

    pub fn centroids(&self) -> &[[f64; D]] {
        &self.centroids
    }

    /// Sum of squared distances from each training point to its centroid.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    /// Index of the nearest centroid; ties go to the lower index.
    pub fn predict(&self, point: &[f64; D]) -> usize {
        nearest(&self.centroids, point).0
    }
}

pub fn squared_distance<const D: usize>(a: &[f64; D], b: &[f64; D]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest<const D: usize>(centroids: &[[f64; D]], point: &[f64; D]) -> (usize, f64) {
    centroids
        .iter()
        .enumerate()
        .map(|(i, c)| (i, squared_distance(c, point)))
        .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best })
}

fn kmeans_plus_plus<const D: usize>(points: &[[f64; D]], k: usize, rng: &mut StdRng) -> Vec<[f64; D]> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.random_range(0..points.len())]);

    while centroids.len() < k {
        let weights: Vec<f64> = points.iter().map(|p| nearest(&centroids, p).1).collect();
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            // Every point already coincides with a centroid.
            centroids.push(points[rng.random_range(0..points.len())]);
            continue;
        }
        let mut target = rng.random::<f64>() * total;
        let mut chosen = points.len() - 1;
        for (i, &w) in weights.iter().enumerate() {
            if target < w {
                chosen = i;
                break;
            }
            target -= w;
        }
        centroids.push(points[chosen]);
    }
    centroids
}

fn lloyd<const D: usize>(
    points: &[[f64; D]],
    mut centroids: Vec<[f64; D]>,
    max_iter: usize,
    tolerance: f64,
) -> KMeans<D> {
    for _ in 0..max_iter.max(1) {
        let mut sums = vec![[0.0_f64; D]; centroids.len()];
        let mut counts = vec![0usize; centroids.len()];
        for point in points {
            let (cluster, _) = nearest(&centroids, point);
            counts[cluster] += 1;
            for (sum, value) in sums[cluster].iter_mut().zip(point) {
                *sum += value;
            }
        }

        let mut shift = 0.0;
        for (cluster, centroid) in centroids.iter_mut().enumerate() {
            // An empty cluster keeps its previous centroid.
            if counts[cluster] == 0 {
                continue;
            }
            let mut updated = sums[cluster];
            for value in updated.iter_mut() {
                *value /= counts[cluster] as f64;
            }
            shift += squared_distance(centroid, &updated);
            *centroid = updated;
        }
        if shift <= tolerance {
            break;
        }
    }

    let inertia = points.iter().map(|p| nearest(&centroids, p).1).sum();
    KMeans { centroids, inertia }
}
