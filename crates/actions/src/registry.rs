//! The built-in action catalog.
//!
//! Three retrieval actions cover the application-status domain: the
//! applicant-tracking lookups (`get_applications`, `get_user_profile`) and
//! the documentation search (`search_docs`). All of them take exactly one
//! required string parameter.

use hopdesk_core::{ActionKind, ActionRegistry, ActionSignature, ParameterSpec};

/// Build the default action registry.
pub fn default_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();

    registry.register(ActionSignature {
        name: "get_applications".into(),
        description: "Fetch the user's job applications and their current statuses, keyed by the applicant's email address".into(),
        required: vec![ParameterSpec::string("email")],
        kind: ActionKind::Retrieval,
    });

    registry.register(ActionSignature {
        name: "get_user_profile".into(),
        description: "Fetch the user's profile (name, resume status, account details), keyed by the applicant's email address".into(),
        required: vec![ParameterSpec::string("email")],
        kind: ActionKind::Retrieval,
    });

    registry.register(ActionSignature {
        name: "search_docs".into(),
        description: "Search the help-center documentation for articles matching a free-text query".into(),
        required: vec![ParameterSpec::string("query")],
        kind: ActionKind::DocSearch,
    });

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_expected_actions() {
        let registry = default_registry();
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.names(),
            vec!["get_applications", "get_user_profile", "search_docs"]
        );
    }

    #[test]
    fn only_search_docs_is_doc_search() {
        let registry = default_registry();
        assert!(registry.is_doc_search("search_docs"));
        assert!(!registry.is_doc_search("get_applications"));
        assert!(!registry.is_doc_search("get_user_profile"));
    }

    #[test]
    fn required_parameters_are_declared() {
        let registry = default_registry();
        let sig = registry.get("get_applications").unwrap();
        assert_eq!(sig.required.len(), 1);
        assert_eq!(sig.required[0].name, "email");

        let sig = registry.get("search_docs").unwrap();
        assert_eq!(sig.required[0].name, "query");
    }
}
