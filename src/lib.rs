//! # Careplan
//!
//! Assembles patient-reported symptoms, condition details, and location into
//! a natural-language prompt, sends it to a text-generation API, and returns
//! the generated treatment-plan narrative. The [`eval`] module scores
//! generated plans against reference text.
//!
//! The pipeline is synchronous and blocking throughout: normalize the input,
//! geocode the address, look up nearby facilities, assemble the prompt, and
//! request one completion. External services sit behind the [`location::Geocode`],
//! [`location::FacilitySource`], and [`openai::chat::ChatCompletion`] traits
//! so each can be substituted in tests.

#![warn(missing_docs)]

pub mod cache;
pub mod config;
pub mod eval;
pub mod location;
pub mod openai;
pub mod patient;
pub mod prompt;
pub mod utils;

use tap::Pipe;

use location::{LocationResolver, NominatimFacilities, NominatimGeocoder, PhotonGeocoder};
use openai::chat::OpenAiChat;
use prompt::assemble::assemble;
use prompt::plan::Planner;

/// Pipeline errors.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid patient input: {0}")]
    Validation(#[from] patient::Error),
    #[error(transparent)]
    Location(#[from] location::Error),
    #[error(transparent)]
    Generation(#[from] prompt::plan::Error),
    #[error(transparent)]
    Configuration(#[from] config::Error),
}

/// Crate-wide result.
pub type Result<T> = core::result::Result<T, Error>;

/// Number of nearby facilities included in a plan prompt.
pub const NEARBY_FACILITY_COUNT: usize = 3;

/// User-Agent sent to the geocoding services.
const USER_AGENT: &str = concat!("careplan/", env!("CARGO_PKG_VERSION"));

/// The full request pipeline: normalize, resolve, assemble, generate.
pub struct TreatmentPipeline {
    resolver: LocationResolver,
    planner: Planner,
}

impl TreatmentPipeline {
    /// Build a pipeline over explicit service handles.
    pub fn new(resolver: LocationResolver, planner: Planner) -> Self {
        Self { resolver, planner }
    }

    /// Build the production pipeline from environment configuration:
    /// Nominatim geocoding with a Photon fallback, Nominatim facility
    /// search, and the OpenAI chat endpoint.
    pub fn from_config(config: &config::Config) -> Result<Self> {
        let resolver = LocationResolver::new(
            Box::new(NominatimGeocoder::new(USER_AGENT)),
            Box::new(NominatimFacilities::new(USER_AGENT)),
        )
        .with_fallback(Box::new(PhotonGeocoder::new(USER_AGENT)));
        let planner = Planner::from_template_file(
            &config.template_path,
            config.model.clone(),
            config.temperature,
            Box::new(OpenAiChat::new(config.api_key.clone())),
        )
        .map_err(Error::Generation)?;
        Self::new(resolver, planner).pipe(Ok)
    }

    /// Generate a treatment-plan narrative for raw patient input.
    pub fn generate_plan(&self, raw: patient::RawPatientInput) -> Result<String> {
        let record = patient::normalize(raw)?;
        tracing::debug!(location = %record.location, "resolving patient location");
        let coordinates = self.resolver.geocode(&record.location)?;
        let nearby = self
            .resolver
            .nearest_facilities(coordinates, NEARBY_FACILITY_COUNT)?;
        let variables = assemble(&record, &nearby);
        tracing::info!(
            facilities = nearby.len(),
            "requesting treatment-plan generation"
        );
        self.planner
            .generate(&variables)
            .map_err(Error::Generation)
    }
}
