use phf::{Map, phf_map};

#[rustfmt::skip]
pub static ATOMIC_NUMBERS: Map<&'static str, u8> = phf_map! {
    // --- Periods 1-2 ---
    "H"  => 1,  "He" => 2,
    "Li" => 3,  "Be" => 4,  "B"  => 5,  "C"  => 6,  "N"  => 7,
    "O"  => 8,  "F"  => 9,  "Ne" => 10,

    // --- Period 3 ---
    "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14, "P"  => 15,
    "S"  => 16, "Cl" => 17, "Ar" => 18,

    // --- Period 4 ---
    "K"  => 19, "Ca" => 20, "Sc" => 21, "Ti" => 22, "V"  => 23,
    "Cr" => 24, "Mn" => 25, "Fe" => 26, "Co" => 27, "Ni" => 28,
    "Cu" => 29, "Zn" => 30, "Ga" => 31, "Ge" => 32, "As" => 33,
    "Se" => 34, "Br" => 35, "Kr" => 36,

    // --- Period 5 ---
    "Rb" => 37, "Sr" => 38, "Y"  => 39, "Zr" => 40, "Nb" => 41,
    "Mo" => 42, "Tc" => 43, "Ru" => 44, "Rh" => 45, "Pd" => 46,
    "Ag" => 47, "Cd" => 48, "In" => 49, "Sn" => 50, "Sb" => 51,
    "Te" => 52, "I"  => 53, "Xe" => 54,
};

#[rustfmt::skip]
static SYMBOLS: [&str; 54] = [
    "H",  "He", "Li", "Be", "B",  "C",  "N",  "O",  "F",  "Ne",
    "Na", "Mg", "Al", "Si", "P",  "S",  "Cl", "Ar", "K",  "Ca",
    "Sc", "Ti", "V",  "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn",
    "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y",  "Zr",
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn",
    "Sb", "Te", "I",  "Xe",
];

/// The atomic number of hydrogen, the element excluded from the charge
/// restraint by default.
pub const HYDROGEN: u8 = 1;

/// Looks up the atomic number for an element symbol.
///
/// The lookup is case-insensitive (`"cl"`, `"CL"`, and `"Cl"` all resolve to 17)
/// and returns `None` for strings that do not name a supported element.
pub fn atomic_number(symbol: &str) -> Option<u8> {
    let trimmed = symbol.trim();
    let mut chars = trimmed.chars();
    let head = chars.next()?;
    let normalized: String = head
        .to_uppercase()
        .chain(chars.flat_map(|c| c.to_lowercase()))
        .collect();
    ATOMIC_NUMBERS.get(normalized.as_str()).copied()
}

/// Returns the canonical symbol for an atomic number, or `None` when the
/// element is outside the supported range.
pub fn symbol(atomic_number: u8) -> Option<&'static str> {
    if atomic_number == 0 {
        return None;
    }
    SYMBOLS.get(atomic_number as usize - 1).copied()
}

/// Derives the molecular formula in Hill order: carbon first, hydrogen second,
/// and all remaining elements alphabetically. Without carbon, all elements are
/// ordered alphabetically.
///
/// Unsupported atomic numbers render as `Z<number>` so the formula stays usable
/// as a filename component.
pub fn hill_formula(atomic_numbers: &[u8]) -> String {
    use std::collections::BTreeMap;

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for &z in atomic_numbers {
        let name = match symbol(z) {
            Some(s) => s.to_string(),
            None => format!("Z{z}"),
        };
        *counts.entry(name).or_insert(0) += 1;
    }

    let mut formula = String::new();
    let mut append = |name: &str, count: usize| {
        formula.push_str(name);
        if count > 1 {
            formula.push_str(&count.to_string());
        }
    };

    if let Some(carbons) = counts.remove("C") {
        append("C", carbons);
        if let Some(hydrogens) = counts.remove("H") {
            append("H", hydrogens);
        }
    }
    for (name, count) in &counts {
        append(name, *count);
    }
    formula
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_number_resolves_known_symbols() {
        assert_eq!(atomic_number("H"), Some(1));
        assert_eq!(atomic_number("C"), Some(6));
        assert_eq!(atomic_number("Cl"), Some(17));
        assert_eq!(atomic_number("I"), Some(53));
    }

    #[test]
    fn atomic_number_is_case_insensitive() {
        assert_eq!(atomic_number("cl"), Some(17));
        assert_eq!(atomic_number("CL"), Some(17));
        assert_eq!(atomic_number(" br "), Some(35));
    }

    #[test]
    fn atomic_number_rejects_unknown_symbols() {
        assert_eq!(atomic_number("Xx"), None);
        assert_eq!(atomic_number(""), None);
    }

    #[test]
    fn symbol_round_trips_through_atomic_number() {
        for z in 1..=54u8 {
            let s = symbol(z).unwrap();
            assert_eq!(atomic_number(s), Some(z));
        }
        assert_eq!(symbol(0), None);
        assert_eq!(symbol(120), None);
    }

    #[test]
    fn hill_formula_puts_carbon_and_hydrogen_first() {
        // Ethanol: C2H6O.
        let ethanol = [6, 6, 8, 1, 1, 1, 1, 1, 1];
        assert_eq!(hill_formula(&ethanol), "C2H6O");
    }

    #[test]
    fn hill_formula_without_carbon_is_alphabetical() {
        // Water: H2O.
        let water = [8, 1, 1];
        assert_eq!(hill_formula(&water), "H2O");
        // Hydrochloric acid: ClH (alphabetical, H not promoted).
        let hcl = [17, 1];
        assert_eq!(hill_formula(&hcl), "ClH");
    }

    #[test]
    fn hill_formula_handles_unsupported_elements() {
        assert_eq!(hill_formula(&[6, 99]), "CZ99");
    }
}
