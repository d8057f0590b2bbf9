use std::io::Read;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

use super::ImportError;
use crate::store::{AssetId, CustomerId, UserId};
use crate::workflows::assets::{
    Asset, AssetStatus, AssetType, ComponentCondition, ComponentHealth, DepreciationMethod,
    MAX_DEPRECIATION_YEARS,
};
use crate::workflows::licenses::{License, LicenseState, LicenseType};

/// First data line of a file with a header row.
const FIRST_DATA_LINE: usize = 2;

pub(crate) fn parse_assets<R: Read>(reader: R) -> Result<Vec<Asset>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut assets = Vec::new();

    for (index, record) in csv_reader.deserialize::<AssetRow>().enumerate() {
        let row = record?;
        assets.push(row.into_asset(FIRST_DATA_LINE + index)?);
    }

    Ok(assets)
}

pub(crate) fn parse_licenses<R: Read>(reader: R) -> Result<Vec<License>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut licenses = Vec::new();

    for (index, record) in csv_reader.deserialize::<LicenseRow>().enumerate() {
        let row = record?;
        licenses.push(row.into_license(FIRST_DATA_LINE + index)?);
    }

    Ok(licenses)
}

#[derive(Debug, Deserialize)]
struct AssetRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Type")]
    asset_type: AssetType,
    #[serde(rename = "Serial Number", default, deserialize_with = "empty_string_as_none")]
    serial_number: Option<String>,
    #[serde(rename = "Customer", default)]
    customer: Option<u64>,
    #[serde(rename = "Status", default)]
    status: Option<AssetStatus>,
    #[serde(rename = "Purchase Date", default, deserialize_with = "empty_string_as_none")]
    purchase_date: Option<String>,
    #[serde(rename = "Purchase Value", default, deserialize_with = "empty_string_as_none")]
    purchase_value: Option<String>,
    #[serde(rename = "Salvage Value", default, deserialize_with = "empty_string_as_none")]
    salvage_value: Option<String>,
    #[serde(rename = "Depreciation Method", default)]
    depreciation_method: Option<DepreciationMethod>,
    #[serde(rename = "Depreciation Years", default)]
    depreciation_years: Option<u32>,
    #[serde(
        rename = "Commissioning Date",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    commissioning_date: Option<String>,
    #[serde(rename = "Warranty End", default, deserialize_with = "empty_string_as_none")]
    warranty_end: Option<String>,
    #[serde(rename = "Maintenance Interval", default)]
    maintenance_interval: Option<u32>,
    #[serde(rename = "CPU", default)]
    cpu: Option<ComponentCondition>,
    #[serde(rename = "RAM", default)]
    ram: Option<ComponentCondition>,
    #[serde(rename = "Disk", default)]
    disk: Option<ComponentCondition>,
    #[serde(rename = "Battery", default)]
    battery: Option<ComponentCondition>,
}

impl AssetRow {
    fn into_asset(self, line: usize) -> Result<Asset, ImportError> {
        let mut asset = Asset::new(self.name, self.asset_type);
        asset.serial_number = self.serial_number;
        asset.customer = self.customer.map(CustomerId);
        if let Some(status) = self.status {
            asset.status = status;
        }
        asset.purchase_date = parse_date(line, "Purchase Date", self.purchase_date)?;
        asset.purchase_value =
            parse_decimal(line, "Purchase Value", self.purchase_value)?.unwrap_or_default();
        asset.salvage_value =
            parse_decimal(line, "Salvage Value", self.salvage_value)?.unwrap_or_default();
        if let Some(method) = self.depreciation_method {
            asset.depreciation_method = method;
        }
        if let Some(years) = self.depreciation_years {
            if years > MAX_DEPRECIATION_YEARS {
                return Err(ImportError::InvalidField {
                    line,
                    field: "Depreciation Years",
                    value: years.to_string(),
                });
            }
            asset.depreciation_years = years;
        }
        asset.commissioning_date = parse_date(line, "Commissioning Date", self.commissioning_date)?;
        asset.warranty_end = parse_date(line, "Warranty End", self.warranty_end)?;
        if let Some(interval) = self.maintenance_interval {
            asset.maintenance_interval_months = interval;
        }
        asset.components = ComponentHealth {
            cpu: self.cpu,
            ram: self.ram,
            disk: self.disk,
            battery: self.battery,
        };
        Ok(asset)
    }
}

#[derive(Debug, Deserialize)]
struct LicenseRow {
    #[serde(rename = "Software")]
    software: String,
    #[serde(rename = "Name", default, deserialize_with = "empty_string_as_none")]
    name: Option<String>,
    #[serde(rename = "Type", default)]
    license_type: Option<LicenseType>,
    #[serde(rename = "Concurrent", default)]
    concurrent: Option<bool>,
    #[serde(rename = "Seats")]
    seats: i64,
    #[serde(rename = "Customer", default)]
    customer: Option<u64>,
    #[serde(rename = "State", default)]
    state: Option<LicenseState>,
    #[serde(rename = "Expiration Date", default, deserialize_with = "empty_string_as_none")]
    expiration_date: Option<String>,
    #[serde(rename = "Vendor", default, deserialize_with = "empty_string_as_none")]
    vendor: Option<String>,
    #[serde(rename = "Renewal Cost", default, deserialize_with = "empty_string_as_none")]
    renewal_cost: Option<String>,
    /// Semicolon separated asset ids.
    #[serde(rename = "Assets", default, deserialize_with = "empty_string_as_none")]
    assets: Option<String>,
    /// Semicolon separated user ids.
    #[serde(rename = "Users", default, deserialize_with = "empty_string_as_none")]
    users: Option<String>,
}

impl LicenseRow {
    fn into_license(self, line: usize) -> Result<License, ImportError> {
        let mut license = License::new(self.software, self.seats);
        if let Some(name) = self.name {
            license.name = name;
        }
        if let Some(license_type) = self.license_type {
            license.license_type = license_type;
        }
        license.concurrent = self.concurrent.unwrap_or(false);
        license.customer = self.customer.map(CustomerId);
        if let Some(state) = self.state {
            license.state = state;
        }
        license.expiration_date = parse_date(line, "Expiration Date", self.expiration_date)?;
        license.vendor = self.vendor;
        license.renewal_cost = parse_decimal(line, "Renewal Cost", self.renewal_cost)?;
        license.assets = parse_ids(line, "Assets", self.assets)?
            .into_iter()
            .map(AssetId)
            .collect();
        license.users = parse_ids(line, "Users", self.users)?
            .into_iter()
            .map(UserId)
            .collect();
        Ok(license)
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn invalid(line: usize, field: &'static str, value: &str) -> ImportError {
    ImportError::InvalidField {
        line,
        field,
        value: value.to_string(),
    }
}

fn parse_date(
    line: usize,
    field: &'static str,
    value: Option<String>,
) -> Result<Option<NaiveDate>, ImportError> {
    value
        .map(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| invalid(line, field, &raw))
        })
        .transpose()
}

fn parse_decimal(
    line: usize,
    field: &'static str,
    value: Option<String>,
) -> Result<Option<Decimal>, ImportError> {
    value
        .map(|raw| Decimal::from_str(raw.trim()).map_err(|_| invalid(line, field, &raw)))
        .transpose()
}

fn parse_ids(line: usize, field: &'static str, value: Option<String>) -> Result<Vec<u64>, ImportError> {
    let Some(raw) = value else {
        return Ok(Vec::new());
    };
    raw.split(';')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.parse::<u64>().map_err(|_| invalid(line, field, id)))
        .collect()
}
