use crate::secret::{MountRequirement, Secret};

/// Error type for pod transformers. On error the input pod is returned to
/// the webhook untouched.
#[derive(Debug, thiserror::Error)]
pub enum InjectError {
  #[error("secret injection requires both group and key to be set, secret: [{secret:?}]")]
  IncompleteSecret { secret: Secret },

  #[error("unrecognized mount requirement [{requirement:?}] for secret [{key}]")]
  UnsupportedMountRequirement {
    requirement: MountRequirement,
    key: String,
  },
}
