//! Registry of runnable test cases.

use crate::testcases::Testbed;
use crate::testcases::fake::{FakeTestFailed, FakeTestSuccessful};
use crate::testcases::filetransfer::{FileTransfer, TransferVariant};
use crate::testcases::logreports::{MemoryReport, SummaryReport, ThroughputReport};
use crate::testcases::ping::SimplePing;
use crate::testcases::update::{ConnectionTest, UpdateSoftware};
use atts_core::{CaseError, TestCase};
use thiserror::Error;
use tracing::warn;

type BuildFn = fn(&Testbed) -> Result<Box<dyn TestCase>, CaseError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown test case '{name}' (known: {})", .known.join(", "))]
    UnknownCase { name: String, known: Vec<String> },
}

/// A case the CLI can build by name.
#[derive(Clone, Copy)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub description: &'static str,
    /// Part of the run when no case is named.
    pub default: bool,
    build: BuildFn,
}

impl CatalogEntry {
    pub fn build(&self, testbed: &Testbed) -> Result<Box<dyn TestCase>, CaseError> {
        (self.build)(testbed)
    }
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("name", &self.name)
            .field("default", &self.default)
            .finish()
    }
}

fn transfer(variant: TransferVariant, build: BuildFn) -> CatalogEntry {
    CatalogEntry {
        name: variant.name(),
        description: variant.description(),
        default: true,
        build,
    }
}

/// Every known case in run order.
pub fn catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry {
            name: UpdateSoftware::NAME,
            description: "Update the software on the nodes.",
            default: false,
            build: |bed: &Testbed| -> Result<Box<dyn TestCase>, CaseError> {
                Ok(Box::new(UpdateSoftware::new(bed)))
            },
        },
        CatalogEntry {
            name: ConnectionTest::NAME,
            description: "A simple connection test.",
            default: true,
            build: |bed: &Testbed| -> Result<Box<dyn TestCase>, CaseError> {
                Ok(Box::new(ConnectionTest::new(bed)))
            },
        },
        CatalogEntry {
            name: SimplePing::NAME,
            description: "A simple dtn ping between two nodes with wireless network.",
            default: true,
            build: |bed: &Testbed| -> Result<Box<dyn TestCase>, CaseError> {
                Ok(Box::new(SimplePing::new(bed)?))
            },
        },
        transfer(TransferVariant::Neighbor, |bed: &Testbed| -> Result<Box<dyn TestCase>, CaseError> {
            Ok(Box::new(FileTransfer::new(bed, TransferVariant::Neighbor)?))
        }),
        transfer(TransferVariant::Wired, |bed: &Testbed| -> Result<Box<dyn TestCase>, CaseError> {
            Ok(Box::new(FileTransfer::new(bed, TransferVariant::Wired)?))
        }),
        transfer(TransferVariant::Epidemic, |bed: &Testbed| -> Result<Box<dyn TestCase>, CaseError> {
            Ok(Box::new(FileTransfer::new(bed, TransferVariant::Epidemic)?))
        }),
        transfer(TransferVariant::Vpn, |bed: &Testbed| -> Result<Box<dyn TestCase>, CaseError> {
            Ok(Box::new(FileTransfer::new(bed, TransferVariant::Vpn)?))
        }),
        CatalogEntry {
            name: SummaryReport::NAME,
            description: "Greps through the log file and search for errors.",
            default: false,
            build: |bed: &Testbed| -> Result<Box<dyn TestCase>, CaseError> {
                Ok(Box::new(SummaryReport::new(bed)))
            },
        },
        CatalogEntry {
            name: ThroughputReport::NAME,
            description: "Report the duration of transmissions.",
            default: false,
            build: |bed: &Testbed| -> Result<Box<dyn TestCase>, CaseError> {
                Ok(Box::new(ThroughputReport::new(bed)))
            },
        },
        CatalogEntry {
            name: MemoryReport::NAME,
            description: "Track the used memory of all testcases.",
            default: false,
            build: |bed: &Testbed| -> Result<Box<dyn TestCase>, CaseError> {
                Ok(Box::new(MemoryReport::new(bed)))
            },
        },
        CatalogEntry {
            name: FakeTestFailed::NAME,
            description: "This is just a fake test to prove the report modules.",
            default: false,
            build: |bed: &Testbed| -> Result<Box<dyn TestCase>, CaseError> {
                Ok(Box::new(FakeTestFailed::new(bed)))
            },
        },
        CatalogEntry {
            name: FakeTestSuccessful::NAME,
            description: "This is just a fake test to prove the report modules.",
            default: false,
            build: |bed: &Testbed| -> Result<Box<dyn TestCase>, CaseError> {
                Ok(Box::new(FakeTestSuccessful::new(bed)))
            },
        },
    ]
}

/// Looks up a case by name, ignoring case.
pub fn find(name: &str) -> Option<CatalogEntry> {
    catalog()
        .into_iter()
        .find(|e| e.name.eq_ignore_ascii_case(name))
}

/// Resolves case names in the order given; no names selects the defaults.
///
/// A name given twice is kept once.
pub fn select(names: &[String]) -> Result<Vec<CatalogEntry>, CatalogError> {
    if names.is_empty() {
        return Ok(catalog().into_iter().filter(|e| e.default).collect());
    }

    let mut selected: Vec<CatalogEntry> = Vec::with_capacity(names.len());
    for name in names {
        let entry = find(name).ok_or_else(|| CatalogError::UnknownCase {
            name: name.clone(),
            known: catalog().iter().map(|e| e.name.to_string()).collect(),
        })?;
        if !selected.iter().any(|e| e.name == entry.name) {
            selected.push(entry);
        }
    }
    Ok(selected)
}

/// Builds the selected cases against `testbed`.
///
/// A case that cannot be built (too few hosts) is skipped with a warning;
/// the others still run.
pub fn build(entries: &[CatalogEntry], testbed: &Testbed) -> Vec<Box<dyn TestCase>> {
    entries
        .iter()
        .filter_map(|entry| match entry.build(testbed) {
            Ok(case) => Some(case),
            Err(e) => {
                warn!("Skipping {}: {}", entry.name, e);
                None
            }
        })
        .collect()
}
