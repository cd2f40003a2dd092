//! State registry: home coordinates and on-demand entity state

use homeward_api::RestClient;
use homeward_core::{Coordinates, StateSnapshot};
use tracing::info;

use crate::error::AppError;

/// Cached home coordinates plus REST-backed state lookups
///
/// Constructed once per [`crate::App`]; cloning shares the underlying
/// HTTP client. The home zone is resolved eagerly so sun-relative
/// schedules can be registered before the event loop starts.
#[derive(Clone, Debug)]
pub struct StateRegistry {
    rest: RestClient,
    home_zone: String,
    coords: Coordinates,
}

impl StateRegistry {
    /// Resolve the home zone and cache its coordinates
    ///
    /// Fails unless the entity id starts with `zone.` and its attributes
    /// carry numeric `latitude` and `longitude`.
    pub(crate) async fn new(rest: RestClient, home_zone: String) -> Result<Self, AppError> {
        if !home_zone.starts_with("zone.") {
            return Err(AppError::InvalidArgs(format!(
                "home zone entity {home_zone:?} is not a zone entity (must start with zone.)"
            )));
        }

        let snapshot = rest.get_state(&home_zone).await?;
        let latitude = snapshot.numeric_attribute("latitude").ok_or_else(|| {
            AppError::InvalidArgs(format!(
                "home zone entity {home_zone:?} is missing a numeric latitude attribute"
            ))
        })?;
        let longitude = snapshot.numeric_attribute("longitude").ok_or_else(|| {
            AppError::InvalidArgs(format!(
                "home zone entity {home_zone:?} is missing a numeric longitude attribute"
            ))
        })?;

        info!(home_zone = %home_zone, latitude, longitude, "Resolved home zone");

        Ok(Self {
            rest,
            home_zone,
            coords: Coordinates {
                latitude,
                longitude,
            },
        })
    }

    /// Fetch the current state of an entity over REST
    pub async fn get(&self, entity_id: &str) -> Result<StateSnapshot, AppError> {
        Ok(self.rest.get_state(entity_id).await?)
    }

    /// Fetch the current states of all entities
    pub async fn get_all(&self) -> Result<Vec<StateSnapshot>, AppError> {
        Ok(self.rest.get_states().await?)
    }

    /// Check whether an entity's current state equals `state`
    pub async fn equals(&self, entity_id: &str, state: &str) -> Result<bool, AppError> {
        let snapshot = self.get(entity_id).await?;
        Ok(snapshot.state == state)
    }

    /// The cached home coordinates
    pub fn coordinates(&self) -> Coordinates {
        self.coords
    }

    /// The entity id the coordinates came from
    pub fn home_zone_entity_id(&self) -> &str {
        &self.home_zone
    }
}
