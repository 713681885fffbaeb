//! Package classification from bill-of-materials properties.

use crate::model::{
    Component, CLEARING_STATE_APPROVED, PROP_CLEARING_STATE, PROP_IS_DEVELOPMENT, PROP_IS_INTERNAL,
};
use crate::promote::traits::{Ecosystem, PackageType, TransferOperation};

/// Ecosystem and package type of one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub ecosystem: Option<Ecosystem>,
    pub package_type: PackageType,
}

impl Classification {
    pub fn operation(&self) -> TransferOperation {
        self.package_type.operation()
    }

    /// Unknown packages are recorded but never transferred.
    pub fn is_transferable(&self) -> bool {
        self.ecosystem.is_some() && self.operation() != TransferOperation::Unknown
    }
}

pub fn classify(component: &Component) -> Classification {
    Classification {
        ecosystem: ecosystem_from_purl(&component.purl),
        package_type: package_type(component),
    }
}

/// Substring match on the purl; first table entry wins.
pub fn ecosystem_from_purl(purl: &str) -> Option<Ecosystem> {
    Ecosystem::ALL
        .into_iter()
        .find(|ecosystem| purl.contains(ecosystem.rules().purl_marker))
}

/// Approved clearing beats the internal flag, which beats the development flag.
pub fn package_type(component: &Component) -> PackageType {
    let approved = component
        .property(PROP_CLEARING_STATE)
        .is_some_and(|state| state.trim() == CLEARING_STATE_APPROVED);

    if approved {
        PackageType::ClearedThirdParty
    } else if component.flag(PROP_IS_INTERNAL) {
        PackageType::Internal
    } else if component.flag(PROP_IS_DEVELOPMENT) {
        PackageType::Development
    } else {
        PackageType::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Property;

    fn component(purl: &str, props: &[(&str, &str)]) -> Component {
        Component {
            name: "pkg".to_string(),
            version: "1.0.0".to_string(),
            group: None,
            purl: purl.to_string(),
            properties: props.iter().map(|(k, v)| Property::new(*k, *v)).collect(),
        }
    }

    #[test]
    fn test_ecosystem_from_purl() {
        assert_eq!(ecosystem_from_purl("pkg:npm/lodash@4.17.21"), Some(Ecosystem::Npm));
        assert_eq!(
            ecosystem_from_purl("pkg:nuget/Newtonsoft.Json@13.0.1"),
            Some(Ecosystem::Nuget)
        );
        assert_eq!(
            ecosystem_from_purl("pkg:maven/junit/junit@4.13.2"),
            Some(Ecosystem::Maven)
        );
        assert_eq!(ecosystem_from_purl("pkg:pypi/html5lib@1.1"), Some(Ecosystem::Poetry));
        assert_eq!(ecosystem_from_purl("pkg:conan/zlib@1.2.13"), Some(Ecosystem::Conan));
        assert_eq!(
            ecosystem_from_purl("pkg:deb/debian/adduser@3.118?arch=all"),
            Some(Ecosystem::Debian)
        );
        assert_eq!(ecosystem_from_purl("pkg:deb/ubuntu/adduser@3.118"), None);
        assert_eq!(ecosystem_from_purl("pkg:cargo/serde@1.0.0"), None);
    }

    #[test]
    fn test_approved_wins_over_flags() {
        let c = component(
            "pkg:npm/a@1",
            &[
                (PROP_CLEARING_STATE, "APPROVED"),
                (PROP_IS_INTERNAL, "true"),
                (PROP_IS_DEVELOPMENT, "true"),
            ],
        );
        let class = classify(&c);
        assert_eq!(class.package_type, PackageType::ClearedThirdParty);
        assert_eq!(class.operation(), TransferOperation::Copy);
    }

    #[test]
    fn test_internal_moves() {
        let c = component(
            "pkg:npm/a@1",
            &[
                (PROP_CLEARING_STATE, "NEW_CLEARING"),
                (PROP_IS_INTERNAL, "true"),
                (PROP_IS_DEVELOPMENT, "true"),
            ],
        );
        let class = classify(&c);
        assert_eq!(class.package_type, PackageType::Internal);
        assert_eq!(class.operation(), TransferOperation::Move);
    }

    #[test]
    fn test_development_copies() {
        let c = component(
            "pkg:pypi/pytest@7.0",
            &[(PROP_IS_INTERNAL, "false"), (PROP_IS_DEVELOPMENT, "true")],
        );
        let class = classify(&c);
        assert_eq!(class.package_type, PackageType::Development);
        assert_eq!(class.operation(), TransferOperation::Copy);
        assert!(class.is_transferable());
    }

    #[test]
    fn test_unresolved_clearing_is_unknown() {
        let c = component("pkg:npm/a@1", &[(PROP_CLEARING_STATE, "NEW_CLEARING")]);
        let class = classify(&c);
        assert_eq!(class.package_type, PackageType::Unknown);
        assert!(!class.is_transferable());
    }

    #[test]
    fn test_unknown_ecosystem_is_not_transferable() {
        let c = component("pkg:cargo/serde@1", &[(PROP_CLEARING_STATE, "APPROVED")]);
        let class = classify(&c);
        assert_eq!(class.ecosystem, None);
        assert_eq!(class.package_type, PackageType::ClearedThirdParty);
        assert!(!class.is_transferable());
    }
}
