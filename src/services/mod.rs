//! External collaborator boundaries and their HTTP implementations.
//!
//! The pipeline only ever sees the traits; the `Http*` types are constructed
//! once at the binary edge from [`crate::config::ScribeConfig`].

pub mod artifacts;
pub mod data;
pub mod model;
pub mod retriever;

pub use artifacts::{ArtifactStore, HttpArtifactStore};
pub use data::{HttpStructuredDataSource, StructuredDataSource};
pub use model::{HttpModelClient, LanguageModelClient};
pub use retriever::{HttpKnowledgeRetriever, KnowledgeRetriever};
