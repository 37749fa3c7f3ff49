use serde::{Deserialize, Serialize};
use std::fmt;

/// Signer credential from the external roster. Read-only to the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signer {
    pub fid: u64,
    pub signer_uuid: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_count: Option<u64>,
}

impl Signer {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p.eq_ignore_ascii_case(permission))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Like,
    Recast,
    Both,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Like => "like",
            ActionType::Recast => "recast",
            ActionType::Both => "both",
        }
    }

    /// Reactions performed per signer, in order.
    pub fn reactions(&self) -> &'static [Reaction] {
        match self {
            ActionType::Like => &[Reaction::Like],
            ActionType::Recast => &[Reaction::Recast],
            ActionType::Both => &[Reaction::Like, Reaction::Recast],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Like,
    Recast,
}

impl Reaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reaction::Like => "like",
            Reaction::Recast => "recast",
        }
    }

    /// Signer permission required to perform this reaction.
    pub fn required_permission(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDetail {
    pub fid: u64,
    pub action: Reaction,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResults {
    pub successful: u64,
    pub failed: u64,
    pub errors: Vec<String>,
    pub details: Vec<ActionDetail>,
}

impl BatchResults {
    pub fn record_success(&mut self, fid: u64, action: Reaction) {
        self.successful += 1;
        self.details.push(ActionDetail { fid, action, success: true, error: None });
    }

    pub fn record_failure(&mut self, fid: u64, action: Reaction, error: String) {
        self.failed += 1;
        self.errors.push(format!("fid {} {}: {}", fid, action, error));
        self.details.push(ActionDetail { fid, action, success: false, error: Some(error) });
    }
}

/// Persisted progress of one engagement batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchState {
    pub cast_hash: String,
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_fid: Option<u64>,
    pub signers: Vec<Signer>,
    pub current_index: usize,
    pub results: BatchResults,
}

impl BatchState {
    pub fn new(cast_hash: String, action_type: ActionType, target_fid: Option<u64>, signers: Vec<Signer>) -> Self {
        Self {
            cast_hash,
            action_type,
            target_fid,
            signers,
            current_index: 0,
            results: BatchResults::default(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current_index >= self.signers.len()
    }
}

/// Final record written once a batch drains.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub batch_id: String,
    pub cast_hash: String,
    pub action_type: ActionType,
    pub signer_count: usize,
    pub successful: u64,
    pub failed: u64,
    pub errors: Vec<String>,
}

impl BatchSummary {
    pub fn from_state(batch_id: &str, state: &BatchState) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            cast_hash: state.cast_hash.clone(),
            action_type: state.action_type,
            signer_count: state.signers.len(),
            successful: state.results.successful,
            failed: state.results.failed,
            errors: state.results.errors.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_state_wire_shape() {
        let state = BatchState::new("0xabc".to_string(), ActionType::Both, Some(3), vec![]);
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["castHash"], "0xabc");
        assert_eq!(value["actionType"], "both");
        assert_eq!(value["targetFid"], 3);
        assert_eq!(value["currentIndex"], 0);
        assert_eq!(value["results"]["successful"], 0);
    }

    #[test]
    fn test_both_performs_like_then_recast() {
        assert_eq!(ActionType::Both.reactions(), &[Reaction::Like, Reaction::Recast]);
    }

    #[test]
    fn test_permission_check_ignores_case() {
        let signer = Signer {
            fid: 1,
            signer_uuid: "uuid".to_string(),
            permissions: vec!["LIKE".to_string()],
            status: "approved".to_string(),
            follower_count: None,
        };
        assert!(signer.has_permission("like"));
        assert!(!signer.has_permission("recast"));
    }
}
