// Policy Repository Port (Interface)

use crate::domain::PolicySet;
use crate::error::Result;
use async_trait::async_trait;

/// Source of the row-level security declarations
#[async_trait]
pub trait PolicyRepository: Send + Sync {
    /// Load RLS-enabled tables and their policies
    async fn load_policy_set(&self) -> Result<PolicySet>;
}
