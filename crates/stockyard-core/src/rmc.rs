//! # Ready-Mix Concrete Orders
//!
//! An RMC order is a sales order whose three lines are derived from a
//! requested concrete volume.
//!
//! ## Mix Ratios (per 10 cu.m of concrete)
//! ```text
//! ┌──────────────────────┬──────────────┬────────────────┐
//! │ Material             │ Per 10 cu.m  │ Per 1 cu.m     │
//! ├──────────────────────┼──────────────┼────────────────┤
//! │ Portland cement      │ 100 bags     │ 10 bags        │
//! │ Crushed gravel       │ 1.5 cu.m     │ 0.15 cu.m      │
//! │ Washed sand          │ 1 cu.m       │ 0.1 cu.m       │
//! └──────────────────────┴──────────────┴────────────────┘
//! ```
//!
//! Each derived quantity can be overridden by hand. An override replaces
//! the default; it is never added to it.
//!
//! Each material draws from one batch only: the earliest available one
//! (oldest purchase date, then oldest row). If that batch cannot cover the
//! quantity, the order is rejected rather than split across batches.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::quantity::Quantity;
use crate::sales::{check_reservation, validate_lines, SalesOrderLine};
use crate::types::ProductStock;
use crate::validation::{
    validate_name, validate_optional_text, validate_price_cents, validate_quantity,
};

// =============================================================================
// Materials
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    PortlandCement,
    CrushedGravel,
    WashedSand,
}

impl Material {
    /// Line order on the generated sales order.
    pub const ALL: [Material; 3] = [
        Material::PortlandCement,
        Material::CrushedGravel,
        Material::WashedSand,
    ];

    /// Units of material per cu.m of concrete, as `numerator / denominator`.
    const fn ratio(&self) -> (i64, i64) {
        match self {
            Material::PortlandCement => (100, 10),
            Material::CrushedGravel => (15, 100),
            Material::WashedSand => (10, 100),
        }
    }

    /// Default quantity of this material for `volume` cu.m of concrete.
    pub fn default_quantity(&self, volume: Quantity) -> Quantity {
        let (num, den) = self.ratio();
        volume.scale(num, den)
    }
}

/// Material quantities for one RMC order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MaterialQuantities {
    #[ts(type = "number")]
    pub portland_cement_bags: Quantity,
    #[ts(type = "number")]
    pub crushed_gravel_cu_m: Quantity,
    #[ts(type = "number")]
    pub washed_sand_cu_m: Quantity,
}

impl MaterialQuantities {
    pub fn get(&self, material: Material) -> Quantity {
        match material {
            Material::PortlandCement => self.portland_cement_bags,
            Material::CrushedGravel => self.crushed_gravel_cu_m,
            Material::WashedSand => self.washed_sand_cu_m,
        }
    }
}

/// Hand-entered quantities. `None` keeps the derived default.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MaterialOverrides {
    #[ts(type = "number | null")]
    pub portland_cement_bags: Option<Quantity>,
    #[ts(type = "number | null")]
    pub crushed_gravel_cu_m: Option<Quantity>,
    #[ts(type = "number | null")]
    pub washed_sand_cu_m: Option<Quantity>,
}

impl MaterialOverrides {
    pub fn get(&self, material: Material) -> Option<Quantity> {
        match material {
            Material::PortlandCement => self.portland_cement_bags,
            Material::CrushedGravel => self.crushed_gravel_cu_m,
            Material::WashedSand => self.washed_sand_cu_m,
        }
    }
}

/// Derives material quantities from a concrete volume.
///
/// ## Example
/// ```rust
/// use stockyard_core::rmc::{derive_materials, MaterialOverrides};
/// use stockyard_core::Quantity;
///
/// let m = derive_materials(Quantity::from_units(20), &MaterialOverrides::default());
/// assert_eq!(m.portland_cement_bags, Quantity::from_units(200));
/// assert_eq!(m.crushed_gravel_cu_m, Quantity::from_units(3));
/// assert_eq!(m.washed_sand_cu_m, Quantity::from_units(2));
/// ```
pub fn derive_materials(volume: Quantity, overrides: &MaterialOverrides) -> MaterialQuantities {
    let pick = |m: Material| overrides.get(m).unwrap_or_else(|| m.default_quantity(volume));
    MaterialQuantities {
        portland_cement_bags: pick(Material::PortlandCement),
        crushed_gravel_cu_m: pick(Material::CrushedGravel),
        washed_sand_cu_m: pick(Material::WashedSand),
    }
}

// =============================================================================
// Order Input
// =============================================================================

/// Which product supplies a material, and at what price.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MaterialSource {
    pub product_id: String,
    /// Defaults to the selling price of the chosen batch.
    pub unit_price_cents: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RmcOrderInput {
    pub customer_id: String,
    pub so_number: Option<String>,
    pub po_number: Option<String>,
    #[ts(as = "String")]
    pub date: NaiveDate,
    /// Requested concrete volume in cu.m.
    #[ts(type = "number")]
    pub volume_cu_m: Quantity,
    pub cement: MaterialSource,
    pub gravel: MaterialSource,
    pub sand: MaterialSource,
    #[serde(default)]
    pub overrides: MaterialOverrides,
}

impl RmcOrderInput {
    pub fn validate(&self) -> CoreResult<()> {
        validate_name("customer_id", &self.customer_id)?;
        if let Some(number) = &self.so_number {
            validate_name("so_number", number)?;
        }
        validate_optional_text("po_number", self.po_number.as_deref())?;
        validate_quantity("volume_cu_m", self.volume_cu_m)?;

        for material in Material::ALL {
            let source = self.source(material);
            validate_name("product_id", &source.product_id)?;
            if let Some(price) = source.unit_price_cents {
                validate_price_cents("unit_price_cents", price)?;
            }
            if let Some(qty) = self.overrides.get(material) {
                validate_quantity("overrides", qty)?;
            }
        }

        Ok(())
    }

    pub fn source(&self, material: Material) -> &MaterialSource {
        match material {
            Material::PortlandCement => &self.cement,
            Material::CrushedGravel => &self.gravel,
            Material::WashedSand => &self.sand,
        }
    }

    pub fn quantities(&self) -> MaterialQuantities {
        derive_materials(self.volume_cu_m, &self.overrides)
    }
}

// =============================================================================
// Batch Selection & Line Planning
// =============================================================================

/// Earliest batch with stock left: oldest purchase date, then oldest row.
pub fn earliest_available(batches: &[ProductStock]) -> Option<&ProductStock> {
    batches
        .iter()
        .filter(|b| b.is_available())
        .min_by(|a, b| {
            (a.purchase_date, a.created_at, &a.id).cmp(&(b.purchase_date, b.created_at, &b.id))
        })
}

/// Builds the three sales order lines against the chosen batches.
///
/// `batches` maps each material to the earliest available batch of its
/// product; a missing entry means the product is out of stock.
pub fn plan_lines(
    input: &RmcOrderInput,
    batches: &HashMap<Material, ProductStock>,
) -> CoreResult<Vec<SalesOrderLine>> {
    let quantities = input.quantities();

    let mut lines = Vec::with_capacity(Material::ALL.len());
    let mut used = Vec::with_capacity(Material::ALL.len());
    for material in Material::ALL {
        let source = input.source(material);
        let batch = batches
            .get(&material)
            .ok_or_else(|| CoreError::NoStockAvailable {
                product_id: source.product_id.clone(),
            })?;

        lines.push(SalesOrderLine {
            product_stock_id: batch.id.clone(),
            quantity: quantities.get(material),
            unit_price_cents: source.unit_price_cents.unwrap_or(batch.selling_price_cents),
            discount_cents: 0,
        });
        used.push(batch.clone());
    }

    validate_lines(&lines)?;
    check_reservation(&lines, &used)?;
    Ok(lines)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sales::sales_order_total;
    use chrono::{Duration, Utc};

    fn batch(id: &str, product: &str, remaining: i64, day: u32) -> ProductStock {
        ProductStock {
            id: id.to_string(),
            company_id: "c1".to_string(),
            product_id: product.to_string(),
            purchase_order_id: None,
            cost_cents: 400,
            selling_price_cents: 550,
            quantity: Quantity::from_units(remaining),
            remaining_quantity: Quantity::from_units(remaining),
            missing: Quantity::zero(),
            purchase_date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn source(product: &str) -> MaterialSource {
        MaterialSource {
            product_id: product.to_string(),
            unit_price_cents: None,
        }
    }

    fn input(volume: i64, overrides: MaterialOverrides) -> RmcOrderInput {
        RmcOrderInput {
            customer_id: "cust".to_string(),
            so_number: None,
            po_number: None,
            date: NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
            volume_cu_m: Quantity::from_units(volume),
            cement: source("cement"),
            gravel: source("gravel"),
            sand: source("sand"),
            overrides,
        }
    }

    fn stocked() -> HashMap<Material, ProductStock> {
        HashMap::from([
            (Material::PortlandCement, batch("bc", "cement", 500, 1)),
            (Material::CrushedGravel, batch("bg", "gravel", 50, 1)),
            (Material::WashedSand, batch("bs", "sand", 50, 1)),
        ])
    }

    #[test]
    fn test_defaults_for_twenty_cubic_metres() {
        let m = derive_materials(Quantity::from_units(20), &MaterialOverrides::default());
        assert_eq!(m.portland_cement_bags, Quantity::from_units(200));
        assert_eq!(m.crushed_gravel_cu_m, Quantity::from_units(3));
        assert_eq!(m.washed_sand_cu_m, Quantity::from_units(2));
    }

    #[test]
    fn test_fractional_volume_is_exact() {
        let m = derive_materials(Quantity::from_milli(2500), &MaterialOverrides::default());
        assert_eq!(m.portland_cement_bags, Quantity::from_units(25));
        assert_eq!(m.crushed_gravel_cu_m, Quantity::from_milli(375));
        assert_eq!(m.washed_sand_cu_m, Quantity::from_milli(250));
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let overrides = MaterialOverrides {
            portland_cement_bags: Some(Quantity::from_units(180)),
            crushed_gravel_cu_m: None,
            washed_sand_cu_m: Some(Quantity::from_milli(2500)),
        };
        let m = derive_materials(Quantity::from_units(20), &overrides);
        assert_eq!(m.portland_cement_bags, Quantity::from_units(180));
        assert_eq!(m.crushed_gravel_cu_m, Quantity::from_units(3));
        assert_eq!(m.washed_sand_cu_m, Quantity::from_milli(2500));
    }

    #[test]
    fn test_earliest_available_skips_empty_batches() {
        let now = Utc::now();
        let mut older_empty = batch("old", "cement", 0, 1);
        older_empty.remaining_quantity = Quantity::zero();
        let mut same_day_later = batch("later", "cement", 10, 2);
        same_day_later.created_at = now + Duration::seconds(5);
        let mut same_day_first = batch("first", "cement", 10, 2);
        same_day_first.created_at = now;
        let newest = batch("new", "cement", 10, 9);

        let batches = vec![newest, same_day_later, older_empty, same_day_first];
        assert_eq!(earliest_available(&batches).map(|b| b.id.as_str()), Some("first"));
        assert!(earliest_available(&[]).is_none());
    }

    #[test]
    fn test_plan_lines_uses_batch_price_by_default() {
        let lines = plan_lines(&input(20, MaterialOverrides::default()), &stocked()).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].product_stock_id, "bc");
        assert_eq!(lines[0].quantity, Quantity::from_units(200));
        assert_eq!(lines[0].unit_price_cents, 550);
        assert_eq!(lines[1].quantity, Quantity::from_units(3));
        assert_eq!(lines[2].quantity, Quantity::from_units(2));
        // 200×5.50 + 3×5.50 + 2×5.50
        assert_eq!(sales_order_total(&lines).unwrap().cents(), 112_750);
    }

    #[test]
    fn test_plan_lines_rejects_quantity_above_first_batch() {
        let mut batches = stocked();
        batches.insert(Material::CrushedGravel, batch("bg", "gravel", 2, 1));
        let err = plan_lines(&input(20, MaterialOverrides::default()), &batches).unwrap_err();
        assert!(matches!(err, CoreError::InsufficientStock { ref stock_id, .. } if stock_id == "bg"));
    }

    #[test]
    fn test_plan_lines_without_stock() {
        let mut batches = stocked();
        batches.remove(&Material::WashedSand);
        let err = plan_lines(&input(20, MaterialOverrides::default()), &batches).unwrap_err();
        assert!(matches!(err, CoreError::NoStockAvailable { ref product_id } if product_id == "sand"));
    }

    #[test]
    fn test_validate_rejects_zero_volume_and_override() {
        assert!(input(0, MaterialOverrides::default()).validate().is_err());
        let overrides = MaterialOverrides {
            portland_cement_bags: Some(Quantity::zero()),
            ..MaterialOverrides::default()
        };
        assert!(input(20, overrides).validate().is_err());
        assert!(input(20, MaterialOverrides::default()).validate().is_ok());
    }
}
