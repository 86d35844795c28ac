use serde::de::Deserializer;
use serde::{Deserialize, Serialize, Serializer};

/// Logical upload destination. Storage is multi-tenant by key prefix inside
/// one shared bucket, so the router only decides the prefix; the bucket name
/// comes from configuration.
///
/// Unknown strings fall back to `Project` rather than erroring, so stored
/// rows written with a typo'd location keep resolving to the general bucket
/// path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, utoipa::ToSchema)]
pub enum TargetLocation {
    Discussions,
    Documents,
    Contracts,
    Finals,
    Deliverables,
    Profiles,
    Project,
}

impl TargetLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetLocation::Discussions => "discussions",
            TargetLocation::Documents => "documents",
            TargetLocation::Contracts => "contracts",
            TargetLocation::Finals => "finals",
            TargetLocation::Deliverables => "deliverables",
            TargetLocation::Profiles => "profiles",
            TargetLocation::Project => "project",
        }
    }
}

impl From<&str> for TargetLocation {
    fn from(value: &str) -> Self {
        match value {
            "discussions" => TargetLocation::Discussions,
            "documents" => TargetLocation::Documents,
            "contracts" => TargetLocation::Contracts,
            "finals" => TargetLocation::Finals,
            "deliverables" => TargetLocation::Deliverables,
            "profiles" => TargetLocation::Profiles,
            _ => TargetLocation::Project,
        }
    }
}

impl Serialize for TargetLocation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TargetLocation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.as_str().into())
    }
}

/// Maps a target location plus optional project/entity/user ids to the key
/// prefix under the shared bucket. Always returns a prefix ending in `/`.
pub fn resolve_path_prefix(
    location: TargetLocation,
    project_id: Option<i32>,
    target_id: Option<i32>,
    user_id: Option<i32>,
) -> String {
    match location {
        TargetLocation::Discussions => match (project_id, target_id) {
            (Some(project), Some(target)) => format!("{}/discussions/{}/", project, target),
            (Some(project), None) => format!("{}/discussions/", project),
            _ => "discussions/".to_string(),
        },
        TargetLocation::Documents | TargetLocation::Contracts => match project_id {
            Some(project) => format!("{}/{}/", project, location.as_str()),
            None => format!("{}/", location.as_str()),
        },
        // Deliverables is an alias; both land in the finals folder.
        TargetLocation::Finals | TargetLocation::Deliverables => match project_id {
            Some(project) => format!("{}/finals/", project),
            None => "finals/".to_string(),
        },
        TargetLocation::Profiles => match user_id {
            Some(user) => format!("profiles/{}/", user),
            None => "profiles/".to_string(),
        },
        TargetLocation::Project => match project_id {
            Some(project) => format!("{}/general/", project),
            None => "general/".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discussions_prefixes() {
        assert_eq!(
            resolve_path_prefix(TargetLocation::Discussions, Some(42), Some(7), None),
            "42/discussions/7/"
        );
        assert_eq!(
            resolve_path_prefix(TargetLocation::Discussions, Some(42), None, None),
            "42/discussions/"
        );
        assert_eq!(
            resolve_path_prefix(TargetLocation::Discussions, None, Some(7), None),
            "discussions/"
        );
        assert_eq!(
            resolve_path_prefix(TargetLocation::Discussions, None, None, None),
            "discussions/"
        );
    }

    #[test]
    fn documents_and_contracts_prefixes() {
        assert_eq!(
            resolve_path_prefix(TargetLocation::Documents, Some(42), None, None),
            "42/documents/"
        );
        assert_eq!(
            resolve_path_prefix(TargetLocation::Documents, None, None, None),
            "documents/"
        );
        assert_eq!(
            resolve_path_prefix(TargetLocation::Contracts, Some(42), Some(9), Some(3)),
            "42/contracts/"
        );
        assert_eq!(
            resolve_path_prefix(TargetLocation::Contracts, None, None, None),
            "contracts/"
        );
    }

    #[test]
    fn deliverables_aliases_finals() {
        assert_eq!(
            resolve_path_prefix(TargetLocation::Finals, Some(42), None, None),
            "42/finals/"
        );
        assert_eq!(
            resolve_path_prefix(TargetLocation::Deliverables, Some(42), None, None),
            "42/finals/"
        );
        assert_eq!(
            resolve_path_prefix(TargetLocation::Finals, None, None, None),
            "finals/"
        );
        assert_eq!(
            resolve_path_prefix(TargetLocation::Deliverables, None, None, None),
            "finals/"
        );
    }

    #[test]
    fn profiles_prefixes_use_user_id() {
        assert_eq!(
            resolve_path_prefix(TargetLocation::Profiles, Some(42), None, Some(3)),
            "profiles/3/"
        );
        assert_eq!(
            resolve_path_prefix(TargetLocation::Profiles, Some(42), None, None),
            "profiles/"
        );
    }

    #[test]
    fn default_bucket_prefixes() {
        assert_eq!(
            resolve_path_prefix(TargetLocation::Project, Some(42), None, None),
            "42/general/"
        );
        assert_eq!(
            resolve_path_prefix(TargetLocation::Project, None, None, None),
            "general/"
        );
    }

    #[test]
    fn unknown_location_falls_back_to_project() {
        assert_eq!(TargetLocation::from("attachments"), TargetLocation::Project);
        assert_eq!(TargetLocation::from(""), TargetLocation::Project);
        assert_eq!(TargetLocation::from("finals"), TargetLocation::Finals);

        let parsed: TargetLocation = serde_json::from_str("\"blueprints\"").unwrap();
        assert_eq!(parsed, TargetLocation::Project);
    }
}
