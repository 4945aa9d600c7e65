//! WT-007: Registry resolver: image reference plus optional pull credentials.

use crate::core::template::{arn, join, reference, ACCOUNT_ID, PARTITION, REGION};
use crate::core::types::{RegistrySpec, RegistryVisibility};
use serde_json::{json, Value};

/// A Secrets Manager secret, addressed by name or by full ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretRef {
    Name(String),
    Arn(String),
}

impl SecretRef {
    /// ARN usable in container definitions. For a name this is the partial
    /// ARN, which Secrets Manager resolves by prefix.
    pub fn arn(&self) -> Value {
        match self {
            Self::Name(name) => arn("secretsmanager", &format!("secret:{}", name)),
            Self::Arn(arn) => json!(arn),
        }
    }

    /// Resource pattern for IAM grants; partial ARNs need the random suffix wildcard.
    pub fn policy_resource(&self) -> Value {
        match self {
            Self::Name(name) => arn("secretsmanager", &format!("secret:{}-??????", name)),
            Self::Arn(arn) => json!(arn),
        }
    }

    /// `{{resolve:secretsmanager:<arn>:SecretString:<field>::}}` dynamic reference.
    pub fn json_field(&self, field: &str) -> Value {
        let mut parts = vec![json!("{{resolve:secretsmanager:")];
        match self {
            Self::Name(name) => parts.extend([
                json!("arn:"),
                reference(PARTITION),
                json!(":secretsmanager:"),
                reference(REGION),
                json!(":"),
                reference(ACCOUNT_ID),
                json!(format!(":secret:{}", name)),
            ]),
            Self::Arn(arn) => parts.push(json!(arn)),
        }
        parts.push(json!(format!(":SecretString:{}::}}}}", field)));
        join("", parts)
    }
}

/// A resolved container image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerImage {
    Public { image: String },
    Private { image: String, credentials: SecretRef },
}

impl ContainerImage {
    pub fn image(&self) -> &str {
        match self {
            Self::Public { image } | Self::Private { image, .. } => image,
        }
    }

    pub fn credentials(&self) -> Option<&SecretRef> {
        match self {
            Self::Public { .. } => None,
            Self::Private { credentials, .. } => Some(credentials),
        }
    }

    /// `RepositoryCredentials` block for the container definition.
    pub fn repository_credentials(&self) -> Option<Value> {
        self.credentials()
            .map(|secret| json!({"CredentialsParameter": secret.arn()}))
    }
}

/// Resolve the image for a registry config.
///
/// A private registry without a credential secret falls back to a plain
/// public reference.
pub fn resolve_image(spec: &RegistrySpec) -> ContainerImage {
    if spec.visibility == RegistryVisibility::Private {
        let credentials = spec
            .secret_arn
            .clone()
            .map(SecretRef::Arn)
            .or_else(|| spec.secret_name.clone().map(SecretRef::Name));
        if let Some(credentials) = credentials {
            return ContainerImage::Private {
                image: spec.image.clone(),
                credentials,
            };
        }
        tracing::warn!(
            image = %spec.image,
            "private registry without secret_name or secret_arn, pulling as public image"
        );
    }
    ContainerImage::Public {
        image: spec.image.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(visibility: RegistryVisibility, name: Option<&str>, arn: Option<&str>) -> RegistrySpec {
        RegistrySpec {
            image: "org/app:1".to_string(),
            visibility,
            secret_name: name.map(String::from),
            secret_arn: arn.map(String::from),
        }
    }

    #[test]
    fn test_wt007_public() {
        let img = resolve_image(&spec(RegistryVisibility::Public, Some("ignored"), None));
        assert_eq!(
            img,
            ContainerImage::Public {
                image: "org/app:1".to_string()
            }
        );
        assert!(img.repository_credentials().is_none());
    }

    #[test]
    fn test_wt007_private_by_name() {
        let img = resolve_image(&spec(RegistryVisibility::Private, Some("dockerhub"), None));
        assert_eq!(img.credentials(), Some(&SecretRef::Name("dockerhub".to_string())));
        let creds = img.repository_credentials().unwrap();
        let parts = &creds["CredentialsParameter"]["Fn::Join"][1];
        assert_eq!(parts[6], json!(":secret:dockerhub"));
    }

    #[test]
    fn test_wt007_private_arn_wins() {
        let arn = "arn:aws:secretsmanager:us-east-1:123456789012:secret:hub-AbCdEf";
        let img = resolve_image(&spec(RegistryVisibility::Private, Some("hub"), Some(arn)));
        assert_eq!(
            img.repository_credentials().unwrap(),
            json!({"CredentialsParameter": arn})
        );
    }

    #[test]
    fn test_wt007_private_without_credentials_falls_back() {
        let img = resolve_image(&spec(RegistryVisibility::Private, None, None));
        assert!(matches!(img, ContainerImage::Public { .. }));
        assert_eq!(img.image(), "org/app:1");
    }

    #[test]
    fn test_wt007_json_field_dynamic_reference() {
        let v = SecretRef::Name("appName".to_string()).json_field("name");
        let parts = v["Fn::Join"][1].as_array().unwrap();
        assert_eq!(parts[0], json!("{{resolve:secretsmanager:"));
        assert_eq!(parts.last().unwrap(), &json!(":SecretString:name::}}"));
    }

    #[test]
    fn test_wt007_policy_resource_wildcard() {
        let v = SecretRef::Name("hub".to_string()).policy_resource();
        assert_eq!(v["Fn::Join"][1][6], json!(":secret:hub-??????"));
    }
}
