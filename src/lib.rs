pub mod error;
pub mod evolution;
pub mod generator;
pub mod keys;
pub mod melody;
pub mod mutation;
pub mod params;
pub mod rating;
pub mod settings;
pub mod subsequence_finder;

pub use error::{EvolveError, EvolveResult};
pub use evolution::{
    skip_generations, Evolution, GenerationId, GenerationStore, MelodyId, MemoryStore, Population,
    Ratings,
};
pub use generator::generate_melody;
pub use keys::Key;
pub use melody::{Melody, MidiByte, Note, Scale};
pub use mutation::mutate;
pub use params::{FitnessParameters, MutationParameters, Statistic};
pub use rating::{rate_melodies, rate_melody, Criterion, Projection, Rating};
pub use settings::Settings;
