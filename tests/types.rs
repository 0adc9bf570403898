// ABOUTME: Integration tests for validated domain types.
// ABOUTME: Tests image reference parsing, deployment names, ports, and workload ids.

use productionapp::types::*;

mod image_ref_tests {
    use super::*;

    #[test]
    fn parse_simple_name() {
        let img = ImageRef::parse("nginx").unwrap();
        assert_eq!(img.name(), "nginx");
        assert_eq!(img.tag(), Some("latest"));
        assert!(img.registry().is_none());
        assert!(img.digest().is_none());
    }

    #[test]
    fn parse_name_with_tag() {
        let img = ImageRef::parse("nginx:1.25").unwrap();
        assert_eq!(img.name(), "nginx");
        assert_eq!(img.tag(), Some("1.25"));
    }

    #[test]
    fn parse_kuard_reference() {
        let img = ImageRef::parse("gcr.io/kuar-demo/kuard-amd64:blue").unwrap();
        assert_eq!(img.registry(), Some("gcr.io"));
        assert_eq!(img.name(), "kuar-demo/kuard-amd64");
        assert_eq!(img.tag(), Some("blue"));
    }

    #[test]
    fn parse_registry_with_port() {
        let img = ImageRef::parse("localhost:5000/app").unwrap();
        assert_eq!(img.registry(), Some("localhost:5000"));
        assert_eq!(img.name(), "app");
        assert_eq!(img.tag(), Some("latest"));
    }

    #[test]
    fn parse_docker_hub_namespace() {
        let img = ImageRef::parse("library/nginx:1").unwrap();
        assert!(img.registry().is_none());
        assert_eq!(img.name(), "library/nginx");
    }

    #[test]
    fn parse_with_digest() {
        let digest = "sha256:abc123def456";
        let img = ImageRef::parse(&format!("nginx@{}", digest)).unwrap();
        assert_eq!(img.name(), "nginx");
        assert_eq!(img.digest(), Some(digest));
        assert!(img.tag().is_none());
    }

    #[test]
    fn parse_full_reference() {
        let img = ImageRef::parse("ghcr.io/org/repo:v1@sha256:abc123").unwrap();
        assert_eq!(img.registry(), Some("ghcr.io"));
        assert_eq!(img.name(), "org/repo");
        assert_eq!(img.tag(), Some("v1"));
        assert_eq!(img.digest(), Some("sha256:abc123"));
    }

    #[test]
    fn implicit_latest_equals_explicit_latest() {
        assert_eq!(
            ImageRef::parse("nginx").unwrap(),
            ImageRef::parse("nginx:latest").unwrap()
        );
        assert_ne!(
            ImageRef::parse("nginx").unwrap(),
            ImageRef::parse("nginx:1.25").unwrap()
        );
    }

    #[test]
    fn parse_errors() {
        assert_eq!(ImageRef::parse(""), Err(ParseImageRefError::Empty));
        assert_eq!(ImageRef::parse("   "), Err(ParseImageRefError::Empty));
        assert_eq!(
            ImageRef::parse("invalid image!"),
            Err(ParseImageRefError::InvalidChar(' '))
        );
        assert!(ImageRef::parse("nginx:").is_err());
        assert!(ImageRef::parse("nginx@").is_err());
        assert!(ImageRef::parse("/nginx").is_err());
    }

    #[test]
    fn display_formats_correctly() {
        let img = ImageRef::parse("ghcr.io/org/repo:v1").unwrap();
        assert_eq!(img.to_string(), "ghcr.io/org/repo:v1");
        assert_eq!(ImageRef::parse("nginx").unwrap().to_string(), "nginx:latest");
    }
}

mod deployment_name_tests {
    use super::*;

    #[test]
    fn valid_dns_name() {
        let name = DeploymentName::new("my-service").unwrap();
        assert_eq!(name.as_str(), "my-service");
    }

    #[test]
    fn empty_returns_error() {
        assert_eq!(DeploymentName::new(""), Err(DeploymentNameError::Empty));
    }

    #[test]
    fn too_long_returns_error() {
        let long_name = "a".repeat(64);
        assert!(DeploymentName::new(&long_name).is_err());
    }

    #[test]
    fn hyphen_at_either_end_returns_error() {
        assert!(DeploymentName::new("-service").is_err());
        assert!(DeploymentName::new("service-").is_err());
    }

    #[test]
    fn uppercase_and_symbols_return_error() {
        assert!(DeploymentName::new("MyService").is_err());
        assert!(DeploymentName::new("my_service").is_err());
        assert!(DeploymentName::new("my.service").is_err());
    }

    #[test]
    fn valid_63_chars() {
        let name = "a".repeat(63);
        assert!(DeploymentName::new(&name).is_ok());
    }

    #[test]
    fn serde_validates() {
        let name: DeploymentName = serde_json::from_str("\"web\"").unwrap();
        assert_eq!(name.as_str(), "web");
        assert!(serde_json::from_str::<DeploymentName>("\"Web\"").is_err());
    }
}

mod port_tests {
    use super::*;

    #[test]
    fn accepts_full_range() {
        assert_eq!(Port::new(1).unwrap().get(), 1);
        assert_eq!(Port::new(65535).unwrap().get(), 65535);
    }

    #[test]
    fn rejects_outside_range() {
        for value in [0, -1, 65536, 70000, i64::MAX, i64::MIN] {
            assert_eq!(Port::new(value), Err(PortError::OutOfRange(value)));
        }
    }

    #[test]
    fn serde_validates() {
        let port: Port = serde_json::from_str("8080").unwrap();
        assert_eq!(port.get(), 8080);
        assert!(serde_json::from_str::<Port>("0").is_err());
        assert!(serde_json::from_str::<Port>("70000").is_err());
    }
}

mod workload_id_tests {
    use super::*;

    #[test]
    fn stores_value() {
        let id = WorkloadId::new("abc123");
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(id.into_inner(), "abc123".to_string());
    }

    #[test]
    fn serializes_transparently() {
        let id = WorkloadId::new("productionapp-web-blue");
        assert_eq!(
            serde_json::to_string(&id).unwrap(),
            "\"productionapp-web-blue\""
        );
    }
}
