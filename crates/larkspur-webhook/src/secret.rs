use serde::{Deserialize, Serialize};

/// How a task wants a secret delivered into its pod.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MountRequirement {
  /// The injector picks; currently always a file mount.
  #[default]
  Any,
  EnvVar,
  File,
}

/// A secret a task requests: `group` names the secret object, `key` the
/// entry inside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Secret {
  pub group: String,
  pub key: String,
  pub mount_requirement: MountRequirement,
}
