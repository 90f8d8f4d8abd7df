pub mod aggregate;
pub mod discover;
pub mod error;
pub mod extract;
pub mod http_renderer;
pub mod pool;
pub mod record;
pub mod remote;
pub mod renderer;

pub use aggregate::{Collected, JobFailure, JobOutcome};
pub use discover::{DiscoveryResult, LinkDiscoverer};
pub use error::ScanError;
pub use extract::{DetailSelectors, ExtractionPolicy, ExtractionSequence, Stage};
pub use http_renderer::HttpRenderer;
pub use pool::{Dispatcher, PoolReport, ProgressCallback};
pub use record::{Field, ProductRecord};
pub use remote::{Capture, RemoteCaptureClient, RemoteOptions};
pub use renderer::{Renderer, RendererSession, Script, ScriptField, SessionProfile, Step};
