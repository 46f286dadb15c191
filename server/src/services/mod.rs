pub mod analytics;
pub mod bulk_import;
pub mod completion;
pub mod images;
pub mod spreadsheet;
pub mod stylist;

pub use bulk_import::{BulkImportReport, BulkImporter};
pub use completion::{CompletionClient, FailoverCompleter, OpenRouterClient, RetryPolicy};
pub use images::{ImageData, ImagePipeline};
pub use stylist::Stylist;
