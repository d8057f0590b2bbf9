//! CSV import of asset and license inventories.
//!
//! Files carry a header row. Empty cells fall back to the record defaults;
//! dates use `YYYY-MM-DD` and amounts are plain decimals.

mod parser;

use std::io::Read;
use std::path::Path;

use crate::workflows::assets::Asset;
use crate::workflows::licenses::License;

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read inventory file: {}", err),
            ImportError::Csv(err) => write!(f, "invalid inventory CSV data: {}", err),
            ImportError::InvalidField { line, field, value } => {
                write!(f, "line {}: invalid {} value '{}'", line, field, value)
            }
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::InvalidField { .. } => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// Reads unsaved [`Asset`] records from a CSV export.
///
/// Columns: `Name`, `Type`, `Serial Number`, `Customer`, `Status`,
/// `Purchase Date`, `Purchase Value`, `Salvage Value`, `Depreciation Method`,
/// `Depreciation Years`, `Commissioning Date`, `Warranty End`,
/// `Maintenance Interval`, `CPU`, `RAM`, `Disk`, `Battery`. Only `Name` and
/// `Type` are required.
pub struct AssetImporter;

impl AssetImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<Asset>, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<Asset>, ImportError> {
        let assets = parser::parse_assets(reader)?;
        tracing::debug!(count = assets.len(), "parsed asset inventory");
        Ok(assets)
    }
}

/// Reads unsaved [`License`] records from a CSV export.
///
/// Columns: `Software`, `Name`, `Type`, `Concurrent`, `Seats`, `Customer`,
/// `State`, `Expiration Date`, `Vendor`, `Renewal Cost`, `Assets`, `Users`.
/// `Assets` and `Users` hold semicolon separated ids.
pub struct LicenseImporter;

impl LicenseImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<License>, ImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<License>, ImportError> {
        let licenses = parser::parse_licenses(reader)?;
        tracing::debug!(count = licenses.len(), "parsed license inventory");
        Ok(licenses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AssetId;
    use crate::workflows::assets::{AssetType, ComponentCondition, DepreciationMethod};
    use crate::workflows::licenses::LicenseState;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    const ASSETS: &str = "\
Name,Type,Serial Number,Customer,Status,Purchase Date,Purchase Value,Salvage Value,Depreciation Method,Depreciation Years,Commissioning Date,Warranty End,Maintenance Interval,CPU,RAM,Disk,Battery
Laptop 01,computer,SN-001,7,active,2024-01-15,1200.00,0,linear,3,,2027-01-15,6,good,medium,,poor
Core switch,network,,, stock ,,,,,,,,,,,,
";

    const LICENSES: &str = "\
Software,Name,Type,Concurrent,Seats,Customer,State,Expiration Date,Vendor,Renewal Cost,Assets,Users
Office,Office 365,saas,false,5,7,active,2025-06-30,Contoso,420.50,1;2; 3,
";

    #[test]
    fn parses_asset_rows_with_defaults_for_blank_cells() {
        let assets = AssetImporter::from_reader(ASSETS.as_bytes()).expect("assets parse");
        assert_eq!(assets.len(), 2);

        let laptop = &assets[0];
        assert_eq!(laptop.name, "Laptop 01");
        assert_eq!(laptop.asset_type, AssetType::Computer);
        assert_eq!(laptop.serial_number.as_deref(), Some("SN-001"));
        assert_eq!(laptop.purchase_date, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(laptop.purchase_value, Decimal::new(120000, 2));
        assert_eq!(laptop.depreciation_method, DepreciationMethod::Linear);
        assert_eq!(laptop.maintenance_interval_months, 6);
        assert_eq!(laptop.components.ram, Some(ComponentCondition::Medium));
        assert_eq!(laptop.components.disk, None);

        let switch = &assets[1];
        assert_eq!(switch.asset_type, AssetType::Network);
        assert!(switch.serial_number.is_none());
        assert!(switch.purchase_date.is_none());
        assert_eq!(switch.purchase_value, Decimal::ZERO);
    }

    #[test]
    fn parses_license_seat_assignments() {
        let licenses = LicenseImporter::from_reader(LICENSES.as_bytes()).expect("licenses parse");
        assert_eq!(licenses.len(), 1);

        let office = &licenses[0];
        assert_eq!(office.name, "Office 365");
        assert_eq!(office.purchased_seats, 5);
        assert_eq!(office.state, LicenseState::Active);
        assert_eq!(office.assets, vec![AssetId(1), AssetId(2), AssetId(3)]);
        assert_eq!(office.renewal_cost, Some(Decimal::new(42050, 2)));
        assert_eq!(office.vendor.as_deref(), Some("Contoso"));
    }

    #[test]
    fn reports_the_line_of_a_malformed_date() {
        let data = "Name,Type,Purchase Date\nGood,computer,2024-01-01\nBad,printer,01/02/2024\n";
        let err = AssetImporter::from_reader(data.as_bytes()).expect_err("bad date");
        match err {
            ImportError::InvalidField { line, field, value } => {
                assert_eq!(line, 3);
                assert_eq!(field, "Purchase Date");
                assert_eq!(value, "01/02/2024");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_an_implausible_depreciation_period() {
        let data = "Name,Type,Depreciation Years\nMainframe,network,400000000\n";
        match AssetImporter::from_reader(data.as_bytes()) {
            Err(ImportError::InvalidField { line, field, value }) => {
                assert_eq!(line, 2);
                assert_eq!(field, "Depreciation Years");
                assert_eq!(value, "400000000");
            }
            other => panic!("expected invalid field, got {other:?}"),
        }
    }

    #[test]
    fn unknown_asset_type_is_a_csv_error() {
        let data = "Name,Type\nThing,toaster\n";
        let err = AssetImporter::from_reader(data.as_bytes()).expect_err("bad type");
        assert!(matches!(err, ImportError::Csv(_)));
    }
}
