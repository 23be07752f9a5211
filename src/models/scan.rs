use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::atoms::ScanAtom;
use super::bean::{BeanCore, Queueable};

/// What the scanning service should run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub path_models: Vec<Value>,
    pub detector_models: BTreeMap<String, Value>,
    pub monitors: Vec<String>,
}

impl ScanRequest {
    pub fn from_atom(atom: &ScanAtom) -> Self {
        Self {
            path_models: atom.path_models.clone(),
            detector_models: atom.detector_models.clone(),
            monitors: atom.monitors.clone(),
        }
    }
}

/// Bean submitted to the scanning service for one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanBean {
    #[serde(flatten)]
    pub core: BeanCore,
    pub scan_request: ScanRequest,
}

impl ScanBean {
    /// Scan bean for an atom, carrying over its name and provenance under a
    /// fresh unique id
    pub fn for_atom(atom: &ScanAtom, scan_request: ScanRequest) -> Self {
        let mut core = BeanCore::new(atom.name());
        core.beamline = atom.core.beamline.clone();
        core.host_name = atom.core.host_name.clone();
        core.user_name = atom.core.user_name.clone();
        core.run_time = atom.core.run_time;
        Self { core, scan_request }
    }
}

impl_queueable!(ScanBean);
