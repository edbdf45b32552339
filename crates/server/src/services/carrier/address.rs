//! Receiver address parsing, delivery estimates and package pricing.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A free-form shipping address split into carrier fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedAddress {
    pub street: String,
    pub house_number: String,
    pub postal_code: String,
    pub city: String,
}

/// Split `"Street 12a, 1234 AB City"` into its parts. Missing parts fall back
/// to placeholder values so a label can always be produced.
#[must_use]
pub fn parse_address(address: &str) -> ParsedAddress {
    let mut parts = address.split(',');
    let street_part = parts.next().unwrap_or_default().trim();
    let city_part = parts.next().unwrap_or_default().trim();

    let (street, house_number) =
        split_house_number(street_part).unwrap_or((street_part, ""));
    let (postal_code, city) = split_postal_code(city_part).unwrap_or((String::new(), city_part));

    ParsedAddress {
        street: or_default(street.trim(), "Unknown"),
        house_number: or_default(house_number, "1"),
        postal_code: if postal_code.is_empty() {
            "1000 AB".to_string()
        } else {
            postal_code
        },
        city: or_default(city, "Amsterdam"),
    }
}

fn or_default(value: &str, default: &str) -> String {
    if value.is_empty() { default } else { value }.to_string()
}

/// Trailing `<digits><letters>` of a street line, e.g. `"12a"`.
fn split_house_number(street: &str) -> Option<(&str, &str)> {
    let without_suffix = street.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    let name = without_suffix.trim_end_matches(|c: char| c.is_ascii_digit());

    let digits_found = name.len() < without_suffix.len();
    (digits_found && !name.is_empty()).then(|| street.split_at(name.len()))
}

/// Leading Dutch postal code (`1234 AB` or `1234AB`) and the remaining city.
fn split_postal_code(part: &str) -> Option<(String, &str)> {
    let digits = part.get(..4).filter(|d| d.chars().all(|c| c.is_ascii_digit()))?;
    let rest = part.get(4..)?;
    let letters_start = rest.trim_start();
    let spacing = rest
        .get(..rest.len() - letters_start.len())
        .unwrap_or_default();

    let letters = letters_start
        .get(..2)
        .filter(|l| l.chars().all(|c| c.is_ascii_uppercase()))?;
    let city = letters_start.get(2..)?.trim_start();
    if city.is_empty() {
        return None;
    }

    Some((format!("{digits}{spacing}{letters}"), city))
}

/// Transit days to a destination given as ISO code or Dutch country name.
#[must_use]
pub fn delivery_days(country: &str) -> u64 {
    match country {
        "NL" | "Nederland" => 1,
        "BE" | "België" | "DE" | "Duitsland" => 2,
        _ => 3,
    }
}

/// Expected delivery date for a shipment leaving on `shipped_on`.
#[must_use]
pub fn estimated_delivery(country: &str, shipped_on: NaiveDate) -> NaiveDate {
    shipped_on
        .checked_add_days(Days::new(delivery_days(country)))
        .unwrap_or(shipped_on)
}

/// Package options accepted by the label endpoints. Missing values use a
/// standard 1 kg, 30×20×10 cm box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct PackageOptions {
    pub weight: Option<i64>,
    pub length: Option<i64>,
    pub width: Option<i64>,
    pub height: Option<i64>,
}

/// Package dimensions in grams and centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Package {
    pub weight_grams: i64,
    pub length_cm: i64,
    pub width_cm: i64,
    pub height_cm: i64,
}

impl From<PackageOptions> for Package {
    fn from(options: PackageOptions) -> Self {
        Self {
            weight_grams: options.weight.unwrap_or(1000),
            length_cm: options.length.unwrap_or(30),
            width_cm: options.width.unwrap_or(20),
            height_cm: options.height.unwrap_or(10),
        }
    }
}

impl Package {
    #[must_use]
    pub const fn volume_cm3(&self) -> i64 {
        self.length_cm * self.width_cm * self.height_cm
    }

    /// Label price: 6.95 base, +2.00 above 2 kg, +1.50 above 10 000 cm³.
    #[must_use]
    pub fn shipping_cost(&self) -> Decimal {
        let mut cost = dec!(6.95);
        if self.weight_grams > 2000 {
            cost += dec!(2.00);
        }
        if self.volume_cm3() > 10_000 {
            cost += dec!(1.50);
        }
        cost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_address() {
        let parsed = parse_address("Kalverstraat 12a, 1012 AB Amsterdam");
        assert_eq!(
            parsed,
            ParsedAddress {
                street: "Kalverstraat".to_string(),
                house_number: "12a".to_string(),
                postal_code: "1012 AB".to_string(),
                city: "Amsterdam".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_compact_postal_code() {
        let parsed = parse_address("Lange Nieuwstraat 4, 3512PH Utrecht");
        assert_eq!(parsed.street, "Lange Nieuwstraat");
        assert_eq!(parsed.house_number, "4");
        assert_eq!(parsed.postal_code, "3512PH");
        assert_eq!(parsed.city, "Utrecht");
    }

    #[test]
    fn test_parse_without_numbers_uses_defaults() {
        let parsed = parse_address("Dorpsplein, Rotterdam");
        assert_eq!(parsed.street, "Dorpsplein");
        assert_eq!(parsed.house_number, "1");
        assert_eq!(parsed.postal_code, "1000 AB");
        assert_eq!(parsed.city, "Rotterdam");
    }

    #[test]
    fn test_parse_empty_address() {
        let parsed = parse_address("");
        assert_eq!(parsed.street, "Unknown");
        assert_eq!(parsed.house_number, "1");
        assert_eq!(parsed.city, "Amsterdam");
    }

    #[test]
    fn test_number_only_street_is_not_split() {
        let parsed = parse_address("42, 1000 AA Amsterdam");
        assert_eq!(parsed.street, "42");
        assert_eq!(parsed.house_number, "1");
    }

    #[test]
    fn test_delivery_days() {
        assert_eq!(delivery_days("NL"), 1);
        assert_eq!(delivery_days("Nederland"), 1);
        assert_eq!(delivery_days("België"), 2);
        assert_eq!(delivery_days("DE"), 2);
        assert_eq!(delivery_days("FR"), 3);
        assert_eq!(delivery_days("ES"), 3);
    }

    #[test]
    fn test_estimated_delivery() {
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap_or_default();
        assert_eq!(
            estimated_delivery("BE", monday),
            NaiveDate::from_ymd_opt(2024, 3, 6).unwrap_or_default()
        );
    }

    #[test]
    fn test_shipping_cost() {
        let standard = Package::from(PackageOptions::default());
        assert_eq!(standard.volume_cm3(), 6000);
        assert_eq!(standard.shipping_cost(), dec!(6.95));

        let heavy_and_large = Package::from(PackageOptions {
            weight: Some(2500),
            length: Some(40),
            width: Some(30),
            height: Some(20),
        });
        assert_eq!(heavy_and_large.shipping_cost(), dec!(10.45));
    }
}
