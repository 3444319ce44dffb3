//! The library code for the `scriptorium` static blog generator. A build
//! breaks down into three steps:
//!
//! 1. Parsing posts from Markdown source files with YAML frontmatter
//!    ([`crate::parser`]), sanitizing their rendered HTML along the way
//!    ([`crate::sanitize`])
//! 2. Laying out the site graph from the published posts
//!    ([`crate::write`]): post pages, the paginated index, the archive,
//!    and the tag pages
//! 3. Rendering every page through the theme's templates
//!    ([`crate::template`]) and writing it, together with the feed
//!    ([`crate::feed`]), the sitemap ([`crate::sitemap`]) and the search
//!    index ([`crate::search`]), into the output directory
//!
//! [`crate::build::Builder`] runs the three steps in order against a
//! [`crate::fsops::FileOps`] and a [`crate::template::Renderer`].
//! Around the build sit the tools for authoring a site: creating posts
//! ([`crate::scaffold`]), editing them ([`crate::store`]), and rebuilding
//! on change ([`crate::watch`]).

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod feed;
pub mod fsops;
pub mod markdown;
pub mod parser;
pub mod post;
pub mod sanitize;
pub mod scaffold;
pub mod search;
pub mod sitemap;
pub mod store;
pub mod tag;
pub mod template;
pub mod watch;
pub mod write;
