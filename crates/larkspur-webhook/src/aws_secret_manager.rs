//! Injects secrets into pods as file mounts, the way the AWS secrets CSI
//! sidecar consumes them.
//!
//! One key per secret object: `group` references the secret, `key` the
//! entry inside it. The secret is mounted into every container and
//! init-container at `/etc/flyte/secrets/<group>`, and each container gets
//! env vars pointing the consuming runtime at the ARN, the mount path, and
//! the file name.

use tracing::error;

use crate::error::InjectError;
use crate::pod::{Container, EnvVar, Pod, SecretVolumeSource, Volume, VolumeMount};
use crate::secret::{MountRequirement, Secret};

pub const AWS_SECRET_ARN_ENV_VAR: &str = "secrets.k8s.aws/secret-arn";
pub const AWS_SECRET_MOUNT_PATH_ENV_VAR: &str = "secrets.k8s.aws/mount-path";
pub const AWS_SECRET_FILENAME_ENV_VAR: &str = "secrets.k8s.aws/secret-filename";
pub const SECRET_MOUNT_PATH_PREFIX: &str = "/etc/flyte/secrets/";

const SECRETS_DEFAULT_DIR_ENV_VAR: &str = "FLYTE_SECRETS_DEFAULT_DIR";
const SECRETS_FILE_PREFIX_ENV_VAR: &str = "FLYTE_SECRETS_FILE_PREFIX";
const SECRETS_DEFAULT_DIR: &str = "/etc/flyte/secrets";

fn format_secret_arn(secret: &Secret) -> String {
  format!(
    "{}:{}",
    secret.group.trim_end_matches(':'),
    secret.key.trim_start_matches(':')
  )
}

fn format_secret_mount_path(secret: &Secret) -> String {
  format!("{}{}", SECRET_MOUNT_PATH_PREFIX, secret.group)
}

/// Volume names must be DNS-1123 labels.
fn volume_name(secret: &Secret) -> String {
  secret
    .group
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() {
        c.to_ascii_lowercase()
      } else {
        '-'
      }
    })
    .collect()
}

fn volume_for_secret(secret: &Secret) -> Volume {
  Volume {
    name: volume_name(secret),
    secret: Some(SecretVolumeSource {
      secret_name: secret.group.clone(),
      optional: true,
    }),
  }
}

fn mount_for_secret(volume: &str, secret: &Secret) -> VolumeMount {
  VolumeMount {
    name: volume.to_string(),
    mount_path: format_secret_mount_path(secret),
    read_only: true,
  }
}

/// Add a mount to every container, skipping containers that already carry
/// a mount of the same name.
fn update_volume_mounts(containers: &mut [Container], mount: &VolumeMount) {
  for container in containers {
    if !container.volume_mounts.iter().any(|m| m.name == mount.name) {
      container.volume_mounts.push(mount.clone());
    }
  }
}

/// Set an env var on every container, skipping containers that already
/// define it.
fn update_env_vars(containers: &mut [Container], env: &EnvVar) {
  for container in containers {
    if !container.env.iter().any(|e| e.name == env.name) {
      container.env.push(env.clone());
    }
  }
}

/// Mounts secrets into pods as files. Only single-key mounts are
/// supported; an entire secret object cannot be mounted at once.
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsSecretManagerInjector;

impl AwsSecretManagerInjector {
  pub fn new() -> Self {
    Self
  }

  pub fn id(&self) -> &'static str {
    "aws-secret-manager"
  }

  /// Produce a mutated copy of `pod` with the secret injected. The input
  /// pod is never modified; on error nothing was injected.
  pub fn inject(&self, secret: &Secret, pod: &Pod) -> Result<Pod, InjectError> {
    if secret.group.is_empty() || secret.key.is_empty() {
      return Err(InjectError::IncompleteSecret {
        secret: secret.clone(),
      });
    }

    match secret.mount_requirement {
      MountRequirement::Any | MountRequirement::File => {
        let mut pod = pod.clone();

        let volume = volume_for_secret(secret);
        let mount = mount_for_secret(&volume.name, secret);
        pod.spec.volumes.push(volume);
        update_volume_mounts(&mut pod.spec.init_containers, &mount);
        update_volume_mounts(&mut pod.spec.containers, &mount);

        let env_vars = [
          EnvVar {
            name: AWS_SECRET_ARN_ENV_VAR.to_string(),
            value: format_secret_arn(secret),
          },
          EnvVar {
            name: AWS_SECRET_MOUNT_PATH_ENV_VAR.to_string(),
            value: format_secret_mount_path(secret),
          },
          EnvVar {
            name: AWS_SECRET_FILENAME_ENV_VAR.to_string(),
            value: secret.key.clone(),
          },
          // Where the consuming runtime should look for secret files.
          EnvVar {
            name: SECRETS_DEFAULT_DIR_ENV_VAR.to_string(),
            value: SECRETS_DEFAULT_DIR.to_string(),
          },
          // Empty prefix: file names match the secret keys as-is.
          EnvVar {
            name: SECRETS_FILE_PREFIX_ENV_VAR.to_string(),
            value: String::new(),
          },
        ];
        for env in &env_vars {
          update_env_vars(&mut pod.spec.init_containers, env);
          update_env_vars(&mut pod.spec.containers, env);
        }

        Ok(pod)
      }
      MountRequirement::EnvVar => {
        let err = InjectError::UnsupportedMountRequirement {
          requirement: secret.mount_requirement,
          key: secret.key.clone(),
        };
        error!(error = %err, "refusing to inject secret");
        Err(err)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pod::PodSpec;

  fn secret(group: &str, key: &str, requirement: MountRequirement) -> Secret {
    Secret {
      group: group.to_string(),
      key: key.to_string(),
      mount_requirement: requirement,
    }
  }

  fn pod() -> Pod {
    Pod {
      spec: PodSpec {
        init_containers: vec![Container {
          name: "init".to_string(),
          ..Default::default()
        }],
        containers: vec![
          Container {
            name: "main".to_string(),
            ..Default::default()
          },
          Container {
            name: "sidecar".to_string(),
            ..Default::default()
          },
        ],
        ..Default::default()
      },
      ..Default::default()
    }
  }

  fn env_value<'a>(container: &'a Container, name: &str) -> Option<&'a str> {
    container
      .env
      .iter()
      .find(|e| e.name == name)
      .map(|e| e.value.as_str())
  }

  #[test]
  fn test_missing_group_or_key_fails_without_mutation() {
    let injector = AwsSecretManagerInjector::new();
    let original = pod();

    for bad in [
      secret("", "token", MountRequirement::File),
      secret("grp", "", MountRequirement::File),
    ] {
      let err = injector.inject(&bad, &original).unwrap_err();
      assert!(matches!(err, InjectError::IncompleteSecret { .. }));
    }
    // The input pod is untouched.
    assert_eq!(original, pod());
  }

  #[test]
  fn test_env_var_mount_is_unsupported() {
    let injector = AwsSecretManagerInjector::new();
    let err = injector
      .inject(&secret("grp", "token", MountRequirement::EnvVar), &pod())
      .unwrap_err();
    assert!(matches!(err, InjectError::UnsupportedMountRequirement { .. }));
  }

  #[test]
  fn test_file_mount_injects_volume_mounts_and_env() {
    let injector = AwsSecretManagerInjector::new();
    let injected = injector
      .inject(&secret("grp", "token", MountRequirement::File), &pod())
      .unwrap();

    assert_eq!(injected.spec.volumes.len(), 1);
    let volume = &injected.spec.volumes[0];
    assert_eq!(volume.secret.as_ref().unwrap().secret_name, "grp");

    let all = injected
      .spec
      .init_containers
      .iter()
      .chain(injected.spec.containers.iter());
    for container in all {
      let mount = &container.volume_mounts[0];
      assert_eq!(mount.name, volume.name);
      assert_eq!(mount.mount_path, "/etc/flyte/secrets/grp");
      assert!(mount.read_only);

      assert_eq!(env_value(container, AWS_SECRET_ARN_ENV_VAR), Some("grp:token"));
      assert_eq!(
        env_value(container, AWS_SECRET_MOUNT_PATH_ENV_VAR),
        Some("/etc/flyte/secrets/grp")
      );
      assert_eq!(env_value(container, AWS_SECRET_FILENAME_ENV_VAR), Some("token"));
      assert_eq!(
        env_value(container, SECRETS_DEFAULT_DIR_ENV_VAR),
        Some("/etc/flyte/secrets")
      );
      assert_eq!(env_value(container, SECRETS_FILE_PREFIX_ENV_VAR), Some(""));
    }
  }

  #[test]
  fn test_any_mount_defaults_to_file() {
    let injector = AwsSecretManagerInjector::new();
    let injected = injector
      .inject(&secret("grp", "token", MountRequirement::Any), &pod())
      .unwrap();
    assert_eq!(injected.spec.volumes.len(), 1);
  }

  #[test]
  fn test_arn_formatting_trims_stray_colons() {
    let s = secret("grp::", "::token", MountRequirement::File);
    assert_eq!(format_secret_arn(&s), "grp:token");
  }

  #[test]
  fn test_volume_name_is_dns_safe() {
    let s = secret("My_Secret.Group", "k", MountRequirement::File);
    assert_eq!(volume_name(&s), "my-secret-group");
  }

  #[test]
  fn test_repeated_injection_does_not_duplicate_mounts_or_env() {
    let injector = AwsSecretManagerInjector::new();
    let s = secret("grp", "token", MountRequirement::File);
    let once = injector.inject(&s, &pod()).unwrap();
    let twice = injector.inject(&s, &once).unwrap();

    let main = &twice.spec.containers[0];
    assert_eq!(main.volume_mounts.len(), 1);
    assert_eq!(
      main.env.iter().filter(|e| e.name == AWS_SECRET_ARN_ENV_VAR).count(),
      1
    );
  }
}
