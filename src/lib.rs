mod count;
mod error;
mod flags;
mod generator;
mod input;
mod suggestion;

#[cfg(feature = "web")]
pub mod web;

pub use count::{BoundsError, CountBounds, DEFAULT_COUNT, MAX_COUNT, MIN_COUNT};
pub use error::{FormDecodeError, PatternCompileError};
pub use flags::CompileFlags;
pub use generator::{DEFAULT_MAX_REPEAT, GenerationCapability, RegexGenerator, Sampler, generate};
pub use input::{FlagInputs, InputModel};
pub use suggestion::{
    QUERY_ROUTE, RouteResolver, RouteTable, SUGGESTED_PATTERN, Suggestion, SuggestionBuilder,
};
