//! Coarse mood labels from the timbral fingerprint.
//!
//! A k-means model is fit once against a small hand-authored reference set
//! and then shared read-only by every classification.

pub mod kmeans;
pub mod reference;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::audio::TimbralFingerprint;
use crate::error::ClusteringError;
use kmeans::{squared_distance, KMeans, KMeansConfig};
use reference::{anchors, ReferencePoint, REFERENCE_DATASET};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    Energetic,
    Chill,
    Neutral,
    Unknown,
}

impl Mood {
    pub fn label(&self) -> &'static str {
        match self {
            Mood::Energetic => "Energetic",
            Mood::Chill => "Chill",
            Mood::Neutral => "Neutral",
            Mood::Unknown => "Unknown",
        }
    }

    /// Display colour used by rendering collaborators.
    pub fn color(&self) -> &'static str {
        match self {
            Mood::Energetic => "red",
            Mood::Chill => "blue",
            Mood::Neutral => "green",
            Mood::Unknown => "gray",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fitted clustering plus the cluster-index to mood table.
#[derive(Debug, Clone, PartialEq)]
pub struct MoodModel {
    kmeans: KMeans<3>,
    labels: Vec<Mood>,
}

static SHARED_MODEL: OnceLock<Arc<MoodModel>> = OnceLock::new();

impl MoodModel {
    /// Fits k-means over `dataset` and then labels every fitted cluster by
    /// the nearest labelled group mean, so the table does not depend on the
    /// order the clustering happens to emit clusters in.
    pub fn fit(dataset: &[ReferencePoint], config: &KMeansConfig) -> Result<Self, ClusteringError> {
        let points: Vec<[f64; 3]> = dataset.iter().map(|p| p.features).collect();
        let kmeans = KMeans::fit(&points, config)?;
        let labels = match_labels(kmeans.centroids(), &anchors(dataset));
        info!(
            "Fitted mood model: {} clusters, inertia {:.4}, labels {:?}",
            kmeans.centroids().len(),
            kmeans.inertia(),
            labels
        );
        Ok(Self { kmeans, labels })
    }

    pub fn fit_reference() -> Result<Self, ClusteringError> {
        Self::fit(&REFERENCE_DATASET, &KMeansConfig::default())
    }

    /// Process-wide model, fit on first use and never mutated afterwards.
    pub fn shared() -> Arc<MoodModel> {
        SHARED_MODEL
            .get_or_init(|| {
                let model = Self::fit_reference().unwrap_or_else(|e| {
                    error!("Mood model fit failed ({}); using reference group means", e);
                    Self::from_anchors(&REFERENCE_DATASET)
                });
                Arc::new(model)
            })
            .clone()
    }

    /// One centroid per labelled group, no fitting.
    pub fn from_anchors(dataset: &[ReferencePoint]) -> Self {
        let (labels, centroids): (Vec<Mood>, Vec<[f64; 3]>) = anchors(dataset).into_iter().unzip();
        Self {
            kmeans: KMeans::from_centroids(centroids),
            labels,
        }
    }

    pub fn centroids(&self) -> &[[f64; 3]] {
        self.kmeans.centroids()
    }

    pub fn labels(&self) -> &[Mood] {
        &self.labels
    }

    pub fn predict_cluster(&self, point: &[f64; 3]) -> usize {
        self.kmeans.predict(point)
    }

    pub fn label_for(&self, cluster: usize) -> Mood {
        self.labels.get(cluster).copied().unwrap_or_else(|| {
            debug!("Cluster {} has no mood label; falling back to Unknown", cluster);
            Mood::Unknown
        })
    }
}

/// Gives every centroid a distinct mood, closest pairs first. Centroids left
/// over once all moods are taken map to `Unknown`.
fn match_labels(centroids: &[[f64; 3]], anchors: &[(Mood, [f64; 3])]) -> Vec<Mood> {
    let mut pairs: Vec<(f64, usize, usize)> = centroids
        .iter()
        .enumerate()
        .flat_map(|(c, centroid)| {
            anchors
                .iter()
                .enumerate()
                .map(move |(a, (_, anchor))| (squared_distance(centroid, anchor), c, a))
        })
        .collect();
    pairs.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)).then(x.2.cmp(&y.2)));

    let mut labels = vec![Mood::Unknown; centroids.len()];
    let mut centroid_taken = vec![false; centroids.len()];
    let mut anchor_taken = vec![false; anchors.len()];
    for (_, c, a) in pairs {
        if centroid_taken[c] || anchor_taken[a] {
            continue;
        }
        labels[c] = anchors[a].0;
        centroid_taken[c] = true;
        anchor_taken[a] = true;
    }
    labels
}

/// Read-only classifier over a shared [`MoodModel`].
#[derive(Debug, Clone)]
pub struct MoodClassifier {
    model: Arc<MoodModel>,
}

impl MoodClassifier {
    pub fn new(model: Arc<MoodModel>) -> Self {
        Self { model }
    }

    pub fn shared() -> Self {
        Self::new(MoodModel::shared())
    }

    pub fn model(&self) -> &MoodModel {
        &self.model
    }

    /// Classifies by the fingerprint's first three coefficients. Always
    /// returns a mood; anything the model cannot place is `Unknown`.
    pub fn classify(&self, fingerprint: &TimbralFingerprint) -> Mood {
        self.classify_projection(fingerprint.projection())
    }

    pub fn classify_projection(&self, projection: [f32; 3]) -> Mood {
        if projection.iter().any(|v| !v.is_finite()) {
            debug!("Non-finite fingerprint {:?}; falling back to Unknown", projection);
            return Mood::Unknown;
        }
        let point = projection.map(f64::from);
        self.model.label_for(self.model.predict_cluster(&point))
    }
}

impl Default for MoodClassifier {
    fn default() -> Self {
        Self::shared()
    }
}
