//! Descriptive fields shared by restaurants and suggestions.

use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Maximum accepted length of a listing name, in characters.
pub const MAX_NAME_LEN: usize = 200;

/// Descriptive fields as submitted by a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingFields {
    pub name: String,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// External place reference (e.g. a maps provider place id).
    pub place_id: Option<String>,
}

/// Partial replacement of [`ListingFields`]; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub place_id: Option<String>,
}

impl ListingFields {
    /// Trim text, turn blank optionals into `None` and validate.
    pub fn normalized(self) -> AppResult<Self> {
        let fields = Self {
            name: self.name.trim().to_string(),
            description: blank_to_none(self.description),
            address: blank_to_none(self.address),
            phone: blank_to_none(self.phone),
            website: blank_to_none(self.website),
            latitude: self.latitude,
            longitude: self.longitude,
            place_id: blank_to_none(self.place_id),
        };
        fields.validate()?;
        Ok(fields)
    }

    /// Overlay a patch on top of these fields.
    pub fn patched(self, patch: ListingPatch) -> Self {
        Self {
            name: patch.name.unwrap_or(self.name),
            description: patch.description.or(self.description),
            address: patch.address.or(self.address),
            phone: patch.phone.or(self.phone),
            website: patch.website.or(self.website),
            latitude: patch.latitude.or(self.latitude),
            longitude: patch.longitude.or(self.longitude),
            place_id: patch.place_id.or(self.place_id),
        }
    }

    fn validate(&self) -> AppResult<()> {
        if self.name.is_empty() {
            return Err(AppError::validation("name must not be empty"));
        }
        if self.name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::validation(format!(
                "name must be at most {MAX_NAME_LEN} characters"
            )));
        }

        match (self.latitude, self.longitude) {
            (None, None) => {}
            (Some(lat), Some(lng)) => validate_coordinate(lat, lng)?,
            _ => {
                return Err(AppError::validation(
                    "latitude and longitude must be given together",
                ));
            }
        }

        if let Some(ref website) = self.website {
            validate_website(website)?;
        }
        Ok(())
    }
}

/// Reject coordinates outside the WGS84 ranges.
pub fn validate_coordinate(latitude: f64, longitude: f64) -> AppResult<()> {
    if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
        return Err(AppError::validation("latitude must be within [-90, 90]"));
    }
    if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::validation("longitude must be within [-180, 180]"));
    }
    Ok(())
}

fn validate_website(website: &str) -> AppResult<()> {
    let url = url::Url::parse(website)
        .map_err(|_| AppError::validation("website must be an absolute URL"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(AppError::validation("website must use http or https")),
    }
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
