//! Build pipeline for wistia-s3 embed artifacts.
//!
//! Assembles the deployable artifact set for the video widget: the loader
//! bundle, an optional demo bundle, and the HTML documents that host them.
//! Development builds keep assets as separate hot-reloadable files;
//! production builds inline CSS/JS into self-contained documents.

pub mod assets;
pub mod builder;
pub mod bundle;
pub mod config;
pub mod entries;
pub mod inline;
pub mod plan;
pub mod template;

pub use builder::{BuildConfig, BuildError, BuildResult, Builder};
pub use bundle::{AssetKind, AssetManifest, Bundler, CompiledAsset, EsbuildBundler};
pub use config::{Mode, Params, ProjectConfig};
pub use entries::{Entry, DEMO_ENTRY, LOADER_ENTRY};
pub use plan::DocumentSpec;
