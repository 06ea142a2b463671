use crate::config::Config;
use crate::providers::nextbike::FeedSnapshot;
use std::collections::HashSet;

/// A tracked bike found in the feed, ready to be stored
#[derive(Debug, Clone, PartialEq)]
pub struct SightingCandidate {
    pub bike_id: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Which part of the feed is of interest
#[derive(Debug, Clone)]
pub struct BikeFilter {
    country: String,
    city: String,
    tracked_bikes: HashSet<String>,
}

impl BikeFilter {
    pub fn new<I, S>(country: impl Into<String>, city: impl Into<String>, tracked_bikes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            country: country.into(),
            city: city.into(),
            tracked_bikes: tracked_bikes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.country.clone(),
            config.city.clone(),
            config.tracked_bikes.iter().cloned(),
        )
    }

    pub fn is_tracked(&self, bike_number: &str) -> bool {
        self.tracked_bikes.contains(bike_number)
    }

    /// Walk the snapshot in feed order and emit one candidate per tracked
    /// bike number occurrence. Names and bike numbers match exactly.
    pub fn select(&self, snapshot: &FeedSnapshot) -> Vec<SightingCandidate> {
        snapshot
            .countries
            .iter()
            .filter(|country| country.name == self.country)
            .flat_map(|country| country.cities.iter())
            .filter(|city| city.name == self.city)
            .flat_map(|city| city.places.iter())
            .flat_map(move |place| {
                place
                    .bike_numbers
                    .iter()
                    .filter(move |bike_number| self.is_tracked(bike_number))
                    .map(move |bike_number| SightingCandidate {
                        bike_id: bike_number.clone(),
                        latitude: place.latitude,
                        longitude: place.longitude,
                    })
            })
            .collect()
    }
}
