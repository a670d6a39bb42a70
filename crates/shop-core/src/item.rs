//! # Catalog Types
//!
//! Items that can be put into a cart, plus the currency they are priced in.
//! Items are created through the catalog-creation request or seeded from
//! `config/items.toml`.

use crate::error::{ShopError, ShopResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Catalog item identifier
pub type ItemId = u64;

const MAX_NAME_CHARS: usize = 255;
const MAX_PRICE_DECIMALS: u32 = 2;
const MAX_PRICE_WHOLE_DIGITS: u32 = 8;

/// Supported currencies (ISO 4217)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    #[default]
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
    CHF,
    MXN,
}

impl Currency {
    /// Every supported currency, in declaration order
    pub const ALL: [Currency; 8] = [
        Currency::USD,
        Currency::EUR,
        Currency::GBP,
        Currency::JPY,
        Currency::CAD,
        Currency::AUD,
        Currency::CHF,
        Currency::MXN,
    ];

    /// Returns the lower-case ISO 4217 code, as the payment API expects it
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::JPY => "jpy",
            Currency::CAD => "cad",
            Currency::AUD => "aud",
            Currency::CHF => "chf",
            Currency::MXN => "mxn",
        }
    }

    /// Returns the upper-case ISO 4217 code
    pub fn code(&self) -> String {
        self.as_str().to_uppercase()
    }

    /// Returns the number of decimal places for this currency
    /// (JPY has 0 decimals, most others have 2)
    pub fn decimal_places(&self) -> u32 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }

    /// Convert a decimal amount to the smallest currency unit, truncating
    /// anything below one minor unit.
    pub fn to_minor_units(&self, amount: Decimal) -> ShopResult<i64> {
        let scaled = amount * Decimal::from(10_i64.pow(self.decimal_places()));
        scaled.trunc().to_i64().ok_or_else(|| ShopError::InvalidAmount {
            message: format!("{} {} does not fit in minor units", amount, self),
        })
    }

    /// Round an amount to this currency's minor unit (half to even)
    pub fn round(&self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.decimal_places(), RoundingStrategy::MidpointNearestEven)
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.code())
    }
}

impl FromStr for Currency {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ShopError::UnsupportedCurrency {
                currency: s.to_string(),
            })
    }
}

impl TryFrom<String> for Currency {
    type Error = ShopError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.code()
    }
}

/// A purchasable catalog item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub description: String,
    /// Unit price, two decimal places
    pub price: Decimal,
    pub currency: Currency,
}

impl Item {
    /// Unit price in the payment API's minor units
    pub fn price_in_minor_units(&self) -> ShopResult<i64> {
        self.currency.to_minor_units(self.price)
    }
}

/// Field-level validation errors, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error against a field
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages recorded for a field
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// Data for a new catalog item, before it has an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub currency: Currency,
}

impl NewItem {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: Decimal,
        currency: Currency,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            price,
            currency,
        }
    }

    /// Parse and validate a catalog-creation request body.
    ///
    /// Every field problem is collected, so the caller gets all of them at once.
    pub fn from_json(body: &serde_json::Value) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = required_string(body, "name", &mut errors);
        let description = required_string(body, "description", &mut errors);
        let price = required_price(body, &mut errors);
        let currency = required_currency(body, &mut errors);

        match (name, description, price, currency) {
            (Some(name), Some(description), Some(price), Some(currency)) if errors.is_empty() => {
                let item = NewItem::new(name, description, price, currency);
                item.validate()?;
                Ok(item)
            }
            _ => Err(errors),
        }
    }

    /// Check field constraints on an already-typed item
    pub fn validate(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        } else if self.name.chars().count() > MAX_NAME_CHARS {
            errors.add(
                "name",
                format!("Ensure this field has no more than {} characters.", MAX_NAME_CHARS),
            );
        }

        if self.description.trim().is_empty() {
            errors.add("description", "This field may not be blank.");
        }

        if self.price.is_sign_negative() && !self.price.is_zero() {
            errors.add("price", "Ensure this value is greater than or equal to 0.");
        }
        if self.price.normalize().scale() > MAX_PRICE_DECIMALS {
            errors.add(
                "price",
                format!(
                    "Ensure that there are no more than {} decimal places.",
                    MAX_PRICE_DECIMALS
                ),
            );
        }
        if self.price.abs().trunc() >= Decimal::from(10_i64.pow(MAX_PRICE_WHOLE_DIGITS)) {
            errors.add(
                "price",
                format!(
                    "Ensure that there are no more than {} digits before the decimal point.",
                    MAX_PRICE_WHOLE_DIGITS
                ),
            );
        }

        errors.into_result()
    }

    /// Attach an id, producing the stored item
    pub fn into_item(self, id: ItemId) -> Item {
        Item {
            id,
            name: self.name,
            description: self.description,
            price: self.price.round_dp(MAX_PRICE_DECIMALS),
            currency: self.currency,
        }
    }
}

fn required_string(body: &serde_json::Value, field: &str, errors: &mut FieldErrors) -> Option<String> {
    match body.get(field) {
        None | Some(serde_json::Value::Null) => {
            errors.add(field, "This field is required.");
            None
        }
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.add(field, "Not a valid string.");
            None
        }
    }
}

fn required_price(body: &serde_json::Value, errors: &mut FieldErrors) -> Option<Decimal> {
    let raw = match body.get("price") {
        None | Some(serde_json::Value::Null) => {
            errors.add("price", "This field is required.");
            return None;
        }
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(_) => String::new(),
    };

    match Decimal::from_str(&raw) {
        Ok(price) => Some(price),
        Err(_) => {
            errors.add("price", "A valid number is required.");
            None
        }
    }
}

fn required_currency(body: &serde_json::Value, errors: &mut FieldErrors) -> Option<Currency> {
    let code = required_string(body, "currency", errors)?;
    if code.chars().count() > 3 {
        errors.add("currency", "Ensure this field has no more than 3 characters.");
        return None;
    }
    match code.parse() {
        Ok(currency) => Some(currency),
        Err(_) => {
            errors.add("currency", format!("\"{}\" is not a supported currency.", code));
            None
        }
    }
}

/// Catalog seed file (`config/items.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub items: Vec<NewItem>,
}

impl CatalogSeed {
    /// Load a seed from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}
