use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProofKind {
    Pickup,
    Delivery,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProofOutcome {
    Completed,
    Failed,
}

/// Evidence captured at a handoff. Immutable after creation apart from
/// note amendments, which only append.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofOfHandoff {
    pub id: Uuid,
    pub job_id: Uuid,
    pub driver_id: Uuid,
    pub kind: ProofKind,
    pub outcome: ProofOutcome,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub id_number: Option<String>,
    pub signature: Option<String>,
    pub photo: Option<String>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub failure_reason: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl ProofOfHandoff {
    pub fn amend_notes(&mut self, addition: &str) {
        match &mut self.notes {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(addition);
            }
            None => self.notes = Some(addition.to_string()),
        }
    }
}
