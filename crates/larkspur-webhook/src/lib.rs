//! Larkspur Webhook
//!
//! Pod manifest transformers. The mutation webhook server itself lives
//! elsewhere; this crate holds the pure rewriters it applies, currently the
//! AWS-secret-manager file injector that mounts task secrets into every
//! container of a pod.

mod aws_secret_manager;
mod error;
mod pod;
mod secret;

pub use aws_secret_manager::{
  AwsSecretManagerInjector, AWS_SECRET_ARN_ENV_VAR, AWS_SECRET_FILENAME_ENV_VAR,
  AWS_SECRET_MOUNT_PATH_ENV_VAR, SECRET_MOUNT_PATH_PREFIX,
};
pub use error::InjectError;
pub use pod::{
  Container, EnvVar, ObjectMeta, Pod, PodSpec, SecretVolumeSource, Volume, VolumeMount,
};
pub use secret::{MountRequirement, Secret};
