/// One directory entry, carried through discovery and enrichment.
///
/// The discovery fields are set once when the listing card is parsed. The
/// founder fields stay empty until enrichment succeeds for this record. The
/// record's index in the surrounding `Vec` is its identity across both stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub batch_label: String,
    pub short_description: String,
    pub detail_url: String,
    pub founder_names: Vec<String>,
    pub founder_profile_urls: Vec<String>,
}

/// Founder data extracted from one detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FounderInfo {
    pub names: Vec<String>,
    pub profile_urls: Vec<String>,
}

impl Record {
    /// A partial record as produced by the discovery stage
    pub fn partial(
        name: impl Into<String>,
        batch_label: impl Into<String>,
        short_description: impl Into<String>,
        detail_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            batch_label: batch_label.into(),
            short_description: short_description.into(),
            detail_url: detail_url.into(),
            founder_names: Vec::new(),
            founder_profile_urls: Vec::new(),
        }
    }

    pub fn is_pending_enrichment(&self) -> bool {
        !self.detail_url.is_empty()
    }

    /// Merged value: discovery fields kept as-is, founder fields replaced
    #[must_use]
    pub fn with_founders(self, founders: FounderInfo) -> Self {
        Self {
            founder_names: founders.names,
            founder_profile_urls: founders.profile_urls,
            ..self
        }
    }

    pub fn founder_names_joined(&self) -> String {
        self.founder_names.join(", ")
    }

    pub fn founder_profile_urls_joined(&self) -> String {
        self.founder_profile_urls.join(", ")
    }
}

impl FounderInfo {
    pub fn is_empty(&self) -> bool {
        self.names.is_empty() && self.profile_urls.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_discovery_fields() {
        let record = Record::partial("Acme", "S24", "Rockets", "https://example.com/companies/acme");
        let merged = record.clone().with_founders(FounderInfo {
            names: vec!["Ann".into(), "Bob".into()],
            profile_urls: vec!["https://www.linkedin.com/in/ann".into()],
        });

        assert_eq!(merged.name, record.name);
        assert_eq!(merged.detail_url, record.detail_url);
        assert_eq!(merged.founder_names_joined(), "Ann, Bob");
        assert_eq!(merged.founder_profile_urls_joined(), "https://www.linkedin.com/in/ann");
    }

    #[test]
    fn empty_founders_leave_fields_empty() {
        let merged = Record::partial("Acme", "S24", "Rockets", "u").with_founders(FounderInfo::default());
        assert!(merged.founder_names.is_empty());
        assert!(merged.founder_profile_urls.is_empty());
        assert_eq!(merged.founder_names_joined(), "");
    }

    #[test]
    fn pending_enrichment_requires_detail_url() {
        assert!(Record::partial("Acme", "", "", "https://x").is_pending_enrichment());
        assert!(!Record::partial("Acme", "", "", "").is_pending_enrichment());
    }
}
