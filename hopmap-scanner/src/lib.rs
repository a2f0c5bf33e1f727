pub mod crawler;
pub mod error;
pub mod html;
pub mod normalize;
pub mod result;
pub mod sitemap;
pub mod tracer;

pub use crawler::{ProgressCallback, SiteCrawler};
pub use error::ScanError;
pub use result::{Hop, TraceResult};
pub use sitemap::{SitemapDocument, SitemapFetcher};
pub use tracer::{RedirectTracer, TracerOptions};
