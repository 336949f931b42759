pub mod artifacts;
pub mod dataset;
pub mod normalizer;
pub mod posters;
pub mod query;
pub mod recommender;
pub mod similarity;
pub mod vectorizer;

pub use artifacts::{build, ArtifactSet, BuildOutput};
pub use recommender::{Lifecycle, Recommender};
