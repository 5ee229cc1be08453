use crate::components::{ResolvedComponents, SpectralComponents};
use crate::error::Result;
use crate::estimator::{Clustering, Estimator};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Content key of a clustering result. Identical keys mean reusable results.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything that was used to produce a result, as recorded next to it.
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSnapshot {
    pub cluster_algorithm: String,
    pub spectral_components: SpectralComponents,
    pub estimator_params: BTreeMap<String, Value>,
    pub n_jobs: usize,
}

impl ParameterSnapshot {
    pub fn new(estimator: &Estimator, components: &ResolvedComponents) -> Result<Self> {
        Ok(Self {
            cluster_algorithm: estimator.name().to_string(),
            spectral_components: components.attr(),
            estimator_params: estimator.get_params()?,
            n_jobs: estimator.n_jobs(),
        })
    }

    /// Flat attributes as written to a results group.
    pub fn to_attributes(&self) -> BTreeMap<String, Value> {
        let mut attributes = self.estimator_params.clone();
        attributes.insert("cluster_algorithm".to_string(), Value::from(self.cluster_algorithm.as_str()));
        attributes.insert("spectral_components".to_string(), self.spectral_components.to_value());
        attributes.insert("n_jobs".to_string(), Value::from(self.n_jobs));
        attributes
    }

    /// SHA-256 over the canonical JSON of the source, the process and the parameters.
    /// The concurrency setting is left out: it never changes the result.
    pub fn fingerprint(&self, source: &str, process_name: &str) -> Fingerprint {
        let identity = json!({
            "source": source,
            "process": process_name,
            "cluster_algorithm": self.cluster_algorithm,
            "spectral_components": self.spectral_components.to_value(),
            "params": self.estimator_params,
        });
        let digest = Sha256::digest(identity.to_string().as_bytes());
        Fingerprint(hex::encode(digest))
    }
}
