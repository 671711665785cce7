//! Slipway HTTP clients
//!
//! Typed clients for the two HTTP services a release talks to:
//! - the package index upload endpoint (`PackageIndexClient`)
//! - the GitHub REST API, for listing existing release tags (`GithubClient`)
//!
//! # Example
//!
//! ```no_run
//! use slipway_client::GithubClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = GithubClient::new("https://api.github.com", std::env::var("GITHUB_TOKEN").ok());
//!     let tags = client.list_tags("jupyterhub/jupyterhub").await?;
//!     println!("{} tags", tags.len());
//!     Ok(())
//! }
//! ```

pub mod digest;
pub mod error;
mod github;
mod index;

pub use digest::{file_sha256, sha256_hex};
pub use error::{ClientError, Result};
pub use github::GithubClient;
pub use index::{PackageIndexClient, UploadOutcome};
