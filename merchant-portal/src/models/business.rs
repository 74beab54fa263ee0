use serde::{Deserialize, Serialize};

/// A business (outlet) owned by the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusinessSummary {
    pub id: String,
    pub name: String,
}
