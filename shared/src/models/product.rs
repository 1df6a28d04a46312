//! Product display units

use serde::{Deserialize, Serialize};

/// Unit of measure for a product. Display-only: the ledger stores plain
/// decimal quantities and never converts between units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductUnit {
    #[default]
    Piece,
    Kilogram,
    Gram,
    Litre,
    Metre,
    SquareMetre,
    Box,
    Sack,
}

impl ProductUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductUnit::Piece => "piece",
            ProductUnit::Kilogram => "kg",
            ProductUnit::Gram => "g",
            ProductUnit::Litre => "litre",
            ProductUnit::Metre => "metre",
            ProductUnit::SquareMetre => "m2",
            ProductUnit::Box => "box",
            ProductUnit::Sack => "sack",
        }
    }

    /// Short label suitable for quantity suffixes ("12.5 kg").
    pub fn label(&self) -> &'static str {
        match self {
            ProductUnit::Piece => "pcs",
            ProductUnit::Kilogram => "kg",
            ProductUnit::Gram => "g",
            ProductUnit::Litre => "l",
            ProductUnit::Metre => "m",
            ProductUnit::SquareMetre => "m²",
            ProductUnit::Box => "box",
            ProductUnit::Sack => "sack",
        }
    }

    /// Parse the code stored in the database.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "piece" => Some(ProductUnit::Piece),
            "kg" => Some(ProductUnit::Kilogram),
            "g" => Some(ProductUnit::Gram),
            "litre" => Some(ProductUnit::Litre),
            "metre" => Some(ProductUnit::Metre),
            "m2" => Some(ProductUnit::SquareMetre),
            "box" => Some(ProductUnit::Box),
            "sack" => Some(ProductUnit::Sack),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProductUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        let units = [
            ProductUnit::Piece,
            ProductUnit::Kilogram,
            ProductUnit::Gram,
            ProductUnit::Litre,
            ProductUnit::Metre,
            ProductUnit::SquareMetre,
            ProductUnit::Box,
            ProductUnit::Sack,
        ];
        for unit in units {
            assert_eq!(ProductUnit::from_code(unit.as_str()), Some(unit));
        }
        assert_eq!(ProductUnit::from_code("barrel"), None);
    }

    #[test]
    fn default_unit_is_piece() {
        assert_eq!(ProductUnit::default(), ProductUnit::Piece);
    }
}
