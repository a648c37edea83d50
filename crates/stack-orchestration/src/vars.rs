//! Variable and credential resolution
//!
//! Variables merge in two layers: shared stack variables first, then
//! service-level variables, with the service winning on key collision.
//! Values pass through opaquely; nothing here coerces types.

use stack_store::{Credentials, VarMap};

/// Merge shared stack variables with service-level overrides
///
/// Shared keys keep their declared order; service-only keys follow.
/// On collision the service value wins.
pub fn merge_variables(shared: &VarMap, service: &VarMap) -> VarMap {
    let mut merged = shared.clone();
    for (key, value) in service {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Resolve the credentials for one deploy or validate call
///
/// Precedence: explicit per-call override, then the stack-level stored
/// override, then the caller-supplied defaults. There is no hidden global
/// lookup.
pub fn resolve_credentials(
    explicit: Option<&Credentials>,
    stack: Option<&Credentials>,
    default: &Credentials,
) -> Credentials {
    explicit.or(stack).unwrap_or(default).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use stack_store::VarValue;

    fn vars(pairs: &[(&str, &str)]) -> VarMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), VarValue::from(*v)))
            .collect()
    }

    fn creds(username: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            password: "pw".to_string(),
        }
    }

    #[test]
    fn test_service_wins_on_collision() {
        let shared = vars(&[("domain", "example.net"), ("mtu", "1500")]);
        let service = vars(&[("mtu", "9000"), ("vlan", "100")]);

        let merged = merge_variables(&shared, &service);
        assert_eq!(merged["domain"], VarValue::from("example.net"));
        assert_eq!(merged["mtu"], VarValue::from("9000"));
        assert_eq!(merged["vlan"], VarValue::from("100"));
    }

    #[test]
    fn test_merge_preserves_declaration_order() {
        let shared = vars(&[("a", "1"), ("b", "2")]);
        let service = vars(&[("b", "x"), ("c", "3")]);

        let merged = merge_variables(&shared, &service);
        let keys: Vec<&str> = merged.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_no_type_coercion() {
        let shared = VarMap::new();
        let service: VarMap = [("vlan_id".to_string(), VarValue::from("100"))]
            .into_iter()
            .collect();

        // A numeric-looking string stays a string
        let merged = merge_variables(&shared, &service);
        assert_eq!(merged["vlan_id"], VarValue::String("100".to_string()));
    }

    #[test]
    fn test_credential_precedence() {
        let explicit = creds("explicit");
        let stack = creds("stack");
        let default = creds("default");

        assert_eq!(
            resolve_credentials(Some(&explicit), Some(&stack), &default).username,
            "explicit"
        );
        assert_eq!(
            resolve_credentials(None, Some(&stack), &default).username,
            "stack"
        );
        assert_eq!(resolve_credentials(None, None, &default).username, "default");
    }
}
