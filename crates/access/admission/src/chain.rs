//! In-process admission: mutate, patch, validate

use crate::error::Result;
use crate::mutate::Mutator;
use crate::patch::apply_patch;
use crate::review::AdmissionRequest;
use crate::validate::Validator;
use access_authz::ApprovalChecker;
use serde_json::Value;

/// Both handlers in the order the write path runs them
#[derive(Debug, Clone)]
pub struct AdmissionChain {
    mutator: Mutator,
    validator: Validator,
}

impl AdmissionChain {
    pub fn new(mutator: Mutator, validator: Validator) -> Self {
        Self { mutator, validator }
    }

    /// Mutator and validator sharing one oracle
    pub fn with_checker(checker: ApprovalChecker) -> Self {
        Self::new(Mutator::new(checker.clone()), Validator::new(checker))
    }

    pub fn mutator(&self) -> &Mutator {
        &self.mutator
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Admit one write. Returns the object to persist (`None` for deletes)
    /// or the first rejection.
    pub async fn admit(&self, mut request: AdmissionRequest) -> Result<Option<Value>> {
        let patch = self.mutator.review(&request).await?;
        if let Some(object) = request.object.as_mut() {
            apply_patch(object, &patch)?;
        }
        self.validator.review(&request).await?;
        Ok(request.object)
    }
}
