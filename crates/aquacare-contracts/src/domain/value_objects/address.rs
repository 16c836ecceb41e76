//! Address Value Object
//!
//! Service address for technician dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    house: Option<String>,
    area: Option<String>,
    city: Option<String>,
    pincode: Option<String>,
    landmark: Option<String>,
}

impl Address {
    pub fn new(
        house: Option<String>,
        area: Option<String>,
        city: Option<String>,
        pincode: Option<String>,
        landmark: Option<String>,
    ) -> Result<Self, AddressError> {
        let pincode = clean(pincode);
        if let Some(pin) = &pincode {
            if pin.len() != 6 || !pin.chars().all(|c| c.is_ascii_digit()) {
                return Err(AddressError::InvalidPincode);
            }
        }

        let address = Self {
            house: clean(house),
            area: clean(area),
            city: clean(city),
            pincode,
            landmark: clean(landmark),
        };
        if address.is_empty() {
            return Err(AddressError::Empty);
        }
        Ok(address)
    }

    pub fn house(&self) -> Option<&str> { self.house.as_deref() }
    pub fn area(&self) -> Option<&str> { self.area.as_deref() }
    pub fn city(&self) -> Option<&str> { self.city.as_deref() }
    pub fn pincode(&self) -> Option<&str> { self.pincode.as_deref() }
    pub fn landmark(&self) -> Option<&str> { self.landmark.as_deref() }

    fn is_empty(&self) -> bool {
        self.house.is_none()
            && self.area.is_none()
            && self.city.is_none()
            && self.pincode.is_none()
            && self.landmark.is_none()
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [&self.house, &self.area, &self.landmark, &self.city, &self.pincode]
            .into_iter()
            .filter_map(|p| p.as_deref())
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("Address has no fields")]
    Empty,
    #[error("Pincode must be six digits")]
    InvalidPincode,
}
