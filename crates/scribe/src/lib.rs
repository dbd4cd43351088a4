pub mod error;
pub mod feeds;
pub mod index;
pub mod markdown;
mod output;
pub mod parsing;
pub mod post;
pub mod site;
pub mod theme;
pub mod types;

pub use error::*;
pub use feeds::*;
pub use index::*;
pub use markdown::*;
pub use parsing::*;
pub use post::*;
pub use site::*;
pub use theme::*;
pub use types::*;
