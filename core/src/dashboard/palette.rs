use std::collections::HashMap;

/// Colors assigned to sections without a fixed or configured color.
pub const PALETTE: [&str; 10] = [
    "#4E79A7", "#F28E2B", "#E15759", "#76B7B2", "#59A14F", "#EDC948", "#B07AA1", "#FF9DA7",
    "#9C755F", "#BAB0AC",
];

/// Well-known sections, matched on the trimmed upper-cased name.
const FIXED_COLORS: &[(&str, &str)] = &[
    ("SEM SEÇÃO", "#9E9E9E"),
    ("STI", "#1565C0"),
    ("COMANDO", "#C62828"),
    ("SECRETARIA", "#6A1B9A"),
    ("ALMOXARIFADO", "#2E7D32"),
    ("SAÚDE", "#00838F"),
    ("FISCALIZAÇÃO", "#EF6C00"),
];

/// Resolves the chart color of a section.
#[derive(Debug, Clone, Default)]
pub struct SectionPalette {
    overrides: HashMap<String, String>,
}

impl SectionPalette {
    pub fn new() -> Self {
        Self::default()
    }

    /// Colors configured by hand, keyed by exact section name.
    pub fn with_overrides(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }

    pub fn set_override(&mut self, section: impl Into<String>, color: impl Into<String>) {
        self.overrides.insert(section.into(), color.into());
    }

    pub fn color_for(&self, section: &str) -> String {
        if let Some(color) = self.overrides.get(section) {
            return color.clone();
        }

        let normalized = section.trim().to_uppercase();
        if let Some((_, color)) = FIXED_COLORS.iter().find(|(name, _)| *name == normalized) {
            return (*color).to_string();
        }

        let index = (section_hash(&normalized).unsigned_abs() % PALETTE.len() as u64) as usize;
        PALETTE[index].to_string()
    }
}

/// `hash = code + ((hash << 5) - hash)` over UTF-16 code units, where the
/// shift truncates to 32 bits and the subtraction does not.
///
/// Must stay bit-for-bit stable: previously rendered charts depend on it.
pub fn section_hash(name: &str) -> i64 {
    name.encode_utf16().fold(0i64, |hash, code| {
        let shifted = (hash as i32).wrapping_shl(5) as i64;
        i64::from(code).wrapping_add(shifted.wrapping_sub(hash))
    })
}
