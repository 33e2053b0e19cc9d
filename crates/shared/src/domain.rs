use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    Percentage,
    Fixed,
    Shipping,
    Bundle,
    #[default]
    General,
}

impl CouponKind {
    /// Lenient parse used for catalog records; anything unrecognised is `General`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "percentage" => Self::Percentage,
            "fixed" => Self::Fixed,
            "shipping" => Self::Shipping,
            "bundle" => Self::Bundle,
            _ => Self::General,
        }
    }
}

/// An offerable coupon. Immutable for the lifetime of a checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "type")]
    pub kind: CouponKind,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Coupon {
    pub fn new(code: impl Into<String>, description: impl Into<String>, kind: CouponKind) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
            kind,
            active: true,
        }
    }
}

/// A discount code currently applied by the host checkout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppliedDiscount {
    pub code: String,
}

impl AppliedDiscount {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into() }
    }
}
