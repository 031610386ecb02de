//! Built-in stages.
//!
//! | name          | shape                               |
//! |---------------|-------------------------------------|
//! | `yafm`        | one-to-many (front matter splitting) |
//! | `paginator`   | one template entry to N pages       |
//! | `sequencer`   | materialize, sort, link, replay     |
//! | `destination` | one-to-one (`destPath`)             |
//! | `permalink`   | one-to-one (`permalink`)            |
//! | `unpublish`   | filter (`published: false`)         |
//! | `summary`     | one-to-one (`summary`)              |
//! | `markdown`    | one-to-one (content to HTML)        |
//! | `template`    | one-to-one (tera rendering)         |
//! | `passthru`    | one-to-one (user callback)          |

mod destination;
mod markdown;
mod paginator;
mod passthru;
mod permalink;
mod sequencer;
mod summary;
mod template;
mod unpublish;
mod yafm;

pub use destination::{DestFn, DestSpec, DestinationOptions, DestinationStage};
pub use markdown::{MarkdownOptions, MarkdownStage};
pub use paginator::{PageBy, PageByFn, PaginatorOptions, PaginatorStage};
pub use passthru::{PassFn, PassthruStage};
pub use permalink::{LinkFn, LinkSpec, PermalinkOptions, PermalinkStage};
pub use sequencer::{SequencerOptions, SequencerStage, SortBy, SortFn};
pub use summary::{SummaryOptions, SummaryStage, summarize};
pub use template::{TemplateOptions, TemplateStage};
pub use unpublish::UnpublishStage;
pub use yafm::{FrontMatterError, YafmOptions, YafmStage, parse_front_matter};
