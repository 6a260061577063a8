use std::collections::HashMap;

use crate::config::DedupConfig;
use crate::error::{CuratorError, Result};

/// Declared equivalence classes of job names.
///
/// Jobs in the same family do redundant work against the same entity (an
/// incremental and a full missing-search for one list, say) and must not run
/// concurrently. A name that was never declared forms its own family.
#[derive(Debug, Clone, Default)]
pub struct JobFamilies {
    members: HashMap<String, String>,
}

impl JobFamilies {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            members: HashMap::new(),
        }
    }

    /// Build the table from configuration.
    pub fn from_config(config: &DedupConfig) -> Result<Self> {
        let mut families = Self::new();
        for family in &config.families {
            families.declare(&family.key, family.members.iter().map(String::as_str))?;
        }
        tracing::debug!(
            families = config.families.len(),
            members = families.len(),
            "Job families declared"
        );
        Ok(families)
    }

    /// Declare a family. A name may belong to one family only.
    pub fn declare<'a>(
        &mut self,
        key: &str,
        members: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        for member in members {
            match self.members.get(member) {
                Some(existing) if existing != key => {
                    return Err(CuratorError::Config(format!(
                        "job '{}' is declared in families '{}' and '{}'",
                        member, existing, key
                    )));
                }
                _ => {
                    self.members.insert(member.to_string(), key.to_string());
                }
            }
        }
        Ok(())
    }

    /// Canonical family key for a job name.
    pub fn family_of<'a>(&'a self, name: &'a str) -> &'a str {
        self.members.get(name).map(String::as_str).unwrap_or(name)
    }

    /// Check whether two job names are mutually exclusive.
    pub fn same_family(&self, a: &str, b: &str) -> bool {
        self.family_of(a) == self.family_of(b)
    }

    /// Number of declared member names.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FamilyConfig;

    fn search_families() -> JobFamilies {
        let mut families = JobFamilies::new();
        families
            .declare(
                "missing_MoviesEN",
                [
                    "searchmissinginc_MoviesEN",
                    "searchmissingfull_MoviesEN",
                    "searchmissinginctitle_MoviesEN",
                ],
            )
            .unwrap();
        families
    }

    #[test]
    fn test_undeclared_name_is_own_family() {
        let families = JobFamilies::new();
        assert!(families.is_empty());
        assert_eq!(families.family_of("refresh_feeds"), "refresh_feeds");
        assert!(families.same_family("refresh_feeds", "refresh_feeds"));
        assert!(!families.same_family("refresh_feeds", "scan_library"));
    }

    #[test]
    fn test_declared_members_share_family() {
        let families = search_families();
        assert_eq!(families.len(), 3);
        assert_eq!(families.family_of("searchmissingfull_MoviesEN"), "missing_MoviesEN");
        assert!(families.same_family("searchmissinginc_MoviesEN", "searchmissinginctitle_MoviesEN"));
        assert!(!families.same_family("searchmissinginc_MoviesEN", "searchmissinginc_MoviesDE"));
    }

    #[test]
    fn test_member_in_two_families_rejected() {
        let mut families = search_families();
        let err = families
            .declare("other", ["searchmissingfull_MoviesEN"])
            .unwrap_err();
        assert!(matches!(err, CuratorError::Config(_)));

        // Re-declaring into the same family is fine.
        families
            .declare("missing_MoviesEN", ["searchmissingfull_MoviesEN"])
            .unwrap();
    }

    #[test]
    fn test_from_config() {
        let config = DedupConfig {
            families: vec![FamilyConfig {
                key: "missing_SeriesEN".to_string(),
                members: vec![
                    "searchmissinginc_SeriesEN".to_string(),
                    "searchmissingfull_SeriesEN".to_string(),
                ],
            }],
        };
        let families = JobFamilies::from_config(&config).unwrap();
        assert!(families.same_family("searchmissinginc_SeriesEN", "searchmissingfull_SeriesEN"));
    }
}
