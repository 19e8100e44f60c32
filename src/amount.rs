//! Payment amount handed to the backend when creating the payment session.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PaymentError;

/// Amount to charge, in the currency's major unit.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(f64);

impl Amount {
    /// Finite, non-negative amounts only.
    pub fn new(value: f64) -> Result<Self, PaymentError> {
        if value.is_finite() && value >= 0.0 {
            Ok(Self(value))
        } else {
            Err(PaymentError::InvalidAmount(value))
        }
    }
}

impl TryFrom<f64> for Amount {
    type Error = PaymentError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
