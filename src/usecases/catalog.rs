//! Use case catalogs
//!
//! Each scenario family (provisioning, transactions, ...) builds its own
//! [`Catalog`]. [`Scenarios`] gathers the families so the CLI can resolve a
//! code without knowing which family owns it.

use std::collections::BTreeMap;

use crate::common::config::StationConfig;
use crate::common::{Error, Result};

use super::step::UseCase;

/// Read-only mapping from use case code to use case
#[derive(Debug, Default)]
pub struct Catalog {
    entries: BTreeMap<String, UseCase>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from use cases, rejecting duplicate codes
    pub fn from_use_cases(use_cases: impl IntoIterator<Item = UseCase>) -> Result<Self> {
        let mut catalog = Self::new();
        for use_case in use_cases {
            catalog.register(use_case)?;
        }
        Ok(catalog)
    }

    /// Insert a use case; a code may only be registered once
    pub fn register(&mut self, use_case: UseCase) -> Result<()> {
        if self.entries.contains_key(use_case.code()) {
            return Err(Error::DuplicateUseCase(use_case.code().to_string()));
        }
        self.entries.insert(use_case.code().to_string(), use_case);
        Ok(())
    }

    pub fn lookup(&self, code: &str) -> Result<&UseCase> {
        self.entries
            .get(code)
            .ok_or_else(|| Error::UseCaseNotFound(code.to_string()))
    }

    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn use_cases(&self) -> impl Iterator<Item = &UseCase> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A group of related use cases built together
pub trait ScenarioFamily: Send + Sync {
    /// Human-readable family name
    fn name(&self) -> &'static str;

    /// Codes this family registers
    fn codes(&self) -> &'static [&'static str];

    /// Build the catalog, minting any per-run correlation tokens
    fn build(&self, station: &StationConfig) -> Result<Catalog>;
}

/// Every scenario family known to the simulator
pub struct Scenarios {
    station: StationConfig,
    families: Vec<Box<dyn ScenarioFamily>>,
}

impl Scenarios {
    /// Register families, rejecting codes claimed by more than one
    pub fn new(station: StationConfig, families: Vec<Box<dyn ScenarioFamily>>) -> Result<Self> {
        let mut seen = std::collections::HashSet::new();
        for family in &families {
            for code in family.codes() {
                if !seen.insert(*code) {
                    return Err(Error::DuplicateUseCase(code.to_string()));
                }
            }
        }
        Ok(Self { station, families })
    }

    /// The provisioning and transaction families
    pub fn standard(station: StationConfig) -> Result<Self> {
        Self::new(
            station,
            vec![
                Box::new(super::provisioning::Provisioning),
                Box::new(super::transactions::Transactions),
            ],
        )
    }

    /// Build a fresh instance of the use case for one run
    ///
    /// The owning family is rebuilt on every call, so tokens such as a
    /// transaction id differ between two runs of the same code.
    pub fn resolve(&self, code: &str) -> Result<UseCase> {
        let family = self
            .families
            .iter()
            .find(|family| family.codes().contains(&code))
            .ok_or_else(|| Error::UseCaseNotFound(code.to_string()))?;

        let mut catalog = family.build(&self.station)?;
        catalog
            .entries
            .remove(code)
            .ok_or_else(|| Error::UseCaseNotFound(code.to_string()))
    }

    /// Every family with its freshly built catalog
    pub fn catalogs(&self) -> Result<Vec<(&'static str, Catalog)>> {
        self.families
            .iter()
            .map(|family| Ok((family.name(), family.build(&self.station)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::step::{Step, UseCaseBuilder};

    fn use_case(code: &str) -> UseCase {
        UseCaseBuilder::new(code, "test")
            .step(Step::new("Heartbeat", b"[]".to_vec(), None))
            .build()
    }

    #[test]
    fn test_lookup_registered() {
        let catalog = Catalog::from_use_cases([use_case("A01"), use_case("A02")]).unwrap();
        assert_eq!(catalog.lookup("A02").unwrap().code(), "A02");
        assert_eq!(catalog.codes().collect::<Vec<_>>(), vec!["A01", "A02"]);
    }

    #[test]
    fn test_lookup_unknown_is_error() {
        let catalog = Catalog::from_use_cases([use_case("A01")]).unwrap();
        assert!(matches!(
            catalog.lookup("Z99"),
            Err(Error::UseCaseNotFound(code)) if code == "Z99"
        ));
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let mut catalog = Catalog::new();
        catalog.register(use_case("A01")).unwrap();
        assert!(matches!(
            catalog.register(use_case("A01")),
            Err(Error::DuplicateUseCase(_))
        ));
        assert_eq!(catalog.len(), 1);
    }

    struct Fixed(&'static [&'static str]);

    impl ScenarioFamily for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn codes(&self) -> &'static [&'static str] {
            self.0
        }

        fn build(&self, _station: &StationConfig) -> Result<Catalog> {
            Catalog::from_use_cases(self.0.iter().map(|code| use_case(code)))
        }
    }

    #[test]
    fn test_scenarios_reject_overlapping_families() {
        let result = Scenarios::new(
            StationConfig::default(),
            vec![Box::new(Fixed(&["A01"])), Box::new(Fixed(&["A01"]))],
        );
        assert!(matches!(result, Err(Error::DuplicateUseCase(_))));
    }

    #[test]
    fn test_scenarios_resolve() {
        let scenarios = Scenarios::new(
            StationConfig::default(),
            vec![Box::new(Fixed(&["A01"])), Box::new(Fixed(&["B07"]))],
        )
        .unwrap();

        assert_eq!(scenarios.resolve("B07").unwrap().code(), "B07");
        assert!(matches!(
            scenarios.resolve("C01"),
            Err(Error::UseCaseNotFound(_))
        ));
    }

    #[test]
    fn test_standard_scenarios() {
        let scenarios = Scenarios::standard(StationConfig::default()).unwrap();
        let catalogs = scenarios.catalogs().unwrap();
        let codes: Vec<_> = catalogs
            .iter()
            .flat_map(|(_, catalog)| catalog.codes().map(str::to_string).collect::<Vec<_>>())
            .collect();
        assert_eq!(codes, vec!["B01", "E02"]);
    }
}
