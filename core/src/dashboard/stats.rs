use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::models::Equipment;

/// Bucket used for records without a type.
pub const UNDEFINED_TYPE: &str = "Indefinido";
/// Bucket used for records without a section.
pub const NO_SECTION: &str = "Sem seção";

const TOP_SECTIONS: usize = 5;

/// Counts per label, kept in the order labels were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Distribution {
    entries: Vec<(String, usize)>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Distribution {
    fn add(&mut self, label: &str) {
        match self.index.get(label) {
            Some(&pos) => self.entries[pos].1 += 1,
            None => {
                self.index.insert(label.to_string(), self.entries.len());
                self.entries.push((label.to_string(), 1));
            }
        }
    }

    pub fn get(&self, label: &str) -> usize {
        self.index
            .get(label)
            .map(|&pos| self.entries[pos].1)
            .unwrap_or(0)
    }

    pub fn entries(&self) -> &[(String, usize)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// The `n` largest buckets; equal counts keep their encounter order.
    pub fn top(&self, n: usize) -> Vec<(String, usize)> {
        let mut ranked = self.entries.clone();
        // sort_by is stable
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
}

/// Aggregates shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total: usize,
    pub unique_ips: usize,
    pub unique_macs: usize,
    pub by_type: Distribution,
    pub by_section: Distribution,
    pub top_sections: Vec<(String, usize)>,
}

impl DashboardStats {
    pub fn from_records(records: &[Equipment]) -> Self {
        let mut ips = HashSet::new();
        let mut macs = HashSet::new();
        let mut by_type = Distribution::default();
        let mut by_section = Distribution::default();

        for record in records {
            if let Some(ip) = Equipment::present(&record.ip) {
                ips.insert(ip);
            }
            if let Some(mac) = Equipment::present(&record.mac) {
                macs.insert(mac.to_ascii_uppercase());
            }
            by_type.add(Equipment::present(&record.kind).unwrap_or(UNDEFINED_TYPE));
            by_section.add(Equipment::present(&record.section).unwrap_or(NO_SECTION));
        }

        let top_sections = by_section.top(TOP_SECTIONS);
        Self {
            total: records.len(),
            unique_ips: ips.len(),
            unique_macs: macs.len(),
            by_type,
            by_section,
            top_sections,
        }
    }
}
