//! Checkout stage and payment method enums.

use serde::{Deserialize, Serialize};

/// Stages of the checkout wizard, in the order they are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutSection {
    #[default]
    Address,
    Payment,
    Confirmation,
}

impl CheckoutSection {
    /// Every stage, first to last.
    pub const ALL: [Self; 3] = [Self::Address, Self::Payment, Self::Confirmation];

    /// Zero-based position of the stage.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Address => 0,
            Self::Payment => 1,
            Self::Confirmation => 2,
        }
    }

    /// Stage at a zero-based position.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Address),
            1 => Some(Self::Payment),
            2 => Some(Self::Confirmation),
            _ => None,
        }
    }

    /// The following stage, if any.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    /// The preceding stage, if any.
    #[must_use]
    pub const fn previous(self) -> Option<Self> {
        match self.index().checked_sub(1) {
            Some(index) => Self::from_index(index),
            None => None,
        }
    }

    /// Whether this is the final stage.
    #[must_use]
    pub const fn is_last(self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for CheckoutSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Address => write!(f, "address"),
            Self::Payment => write!(f, "payment"),
            Self::Confirmation => write!(f, "confirmation"),
        }
    }
}

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodKind {
    /// Credit or debit card.
    Card,
    /// `PayPal` account.
    PayPal,
}

impl std::fmt::Display for PaymentMethodKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Card => write!(f, "card"),
            Self::PayPal => write!(f, "paypal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_order() {
        assert_eq!(CheckoutSection::Address.next(), Some(CheckoutSection::Payment));
        assert_eq!(
            CheckoutSection::Payment.next(),
            Some(CheckoutSection::Confirmation)
        );
        assert_eq!(CheckoutSection::Confirmation.next(), None);
        assert_eq!(CheckoutSection::Address.previous(), None);
        assert!(CheckoutSection::Confirmation.is_last());
    }

    #[test]
    fn test_index_roundtrip() {
        for section in CheckoutSection::ALL {
            assert_eq!(CheckoutSection::from_index(section.index()), Some(section));
        }
        assert_eq!(CheckoutSection::from_index(3), None);
    }

    #[test]
    fn test_section_display() {
        assert_eq!(CheckoutSection::Confirmation.to_string(), "confirmation");
        assert_eq!(PaymentMethodKind::PayPal.to_string(), "paypal");
    }
}
