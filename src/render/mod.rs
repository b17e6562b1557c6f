mod background;
mod convert;
mod error;
mod fallback;
mod helpers;
mod invoker;
mod locator;
mod pipeline;
mod process;
mod scratch;
mod types;

pub use background::ensure_white_background;
pub use convert::{Converted, FormatConverter};
pub use error::{AttemptFailure, RenderError};
pub use fallback::{Outline, render_fallback};
pub use helpers::{LayoutHelperInstall, discover_layout_helpers};
pub use invoker::{Exhausted, InvokerSuccess, Invoker, LayoutHelper, Strategy, Transport};
pub use pipeline::Pipeline;
pub use process::Invocation;
pub use types::{AttemptOutcome, RenderAttempt, RenderOptions, RenderRequest, RenderResult};
