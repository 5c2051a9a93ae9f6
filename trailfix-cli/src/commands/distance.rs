//! Distance command - haversine distance between two coordinates.

use trailfix::geo::GeoPoint;

use crate::error::CliError;

/// Run the distance command.
pub fn run(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> Result<(), CliError> {
    let from = point(lat1, lon1)?;
    let to = point(lat2, lon2)?;
    println!("{:.1} m", from.distance_to(&to));
    Ok(())
}

fn point(latitude: f64, longitude: f64) -> Result<GeoPoint, CliError> {
    GeoPoint::new(latitude, longitude).map_err(|e| CliError::InvalidArgument(e.to_string()))
}
