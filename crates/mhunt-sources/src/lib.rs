//! Source catalog, source selection, and parsing/validation of provider output.

mod catalog;
mod parser;
mod selector;
mod validator;

pub use catalog::{Bucket, CatalogError, SourceCatalog};
pub use parser::{parse_candidates, Candidate, LooseNumber};
pub use selector::{SourceSelector, DEFAULT_SOURCE_CAP};
pub use validator::{
    OpportunityValidator, Rejection, ValidationOutcome, DEFAULT_MATCH_SCORE, DEFAULT_PLATFORM,
    DEFAULT_REWARD, DEFAULT_TITLE,
};

pub const CRATE_NAME: &str = "mhunt-sources";
