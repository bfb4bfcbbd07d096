//! the stages of a staged copy, in the order they run

mod archive;
mod download;
mod merge;
mod publish;
mod scan;

pub use archive::{ArchiveBuilder, BuiltArchive, RenameOperation};
pub use download::{download, StagedFile};
pub use merge::{merge_all, MergeReport};
pub use publish::publish;
pub use scan::scan;
