//! Core data models and types for mogfs

pub mod error;
pub mod fields;
pub mod types;

pub use error::*;
pub use fields::*;
pub use types::*;

/// Result type alias for mogfs core operations
pub type Result<T> = std::result::Result<T, MogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_name_creation() {
        let domain = DomainName::new("photos").unwrap();
        assert_eq!(domain.as_str(), "photos");
        assert_eq!(domain.to_string(), "photos");
    }

    #[test]
    fn test_domain_name_validation() {
        assert!(DomainName::new("photos").is_ok());
        assert!(DomainName::new("photos-2024_eu").is_ok());

        assert!(DomainName::new("").is_err());
        assert!(DomainName::new("two words").is_err());
        assert!(DomainName::new("tab\there").is_err());
    }

    #[test]
    fn test_key_validation() {
        assert!(Key::new("cat.jpg").is_ok());
        assert!(Key::new("folder/with spaces/file.txt").is_ok());
        assert!(Key::new("a=b&c").is_ok());

        assert!(Key::new("").is_err());
        assert!(Key::new("line\nbreak").is_err());
    }
}
