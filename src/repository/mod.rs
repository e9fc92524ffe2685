// Repository module - user-level workflows on top of the dispatcher
//
// - facade: current-repository tracking, change listeners, workflows
// - url: advisory clone URL validation

pub mod facade;
pub mod url;

pub use facade::{
    FolderPicker, FolderSelection, MenuActionResult, OperationResult, RepositoryDescriptor,
    RepositoryFacade, RepositoryListener, Subscription,
};
pub use url::is_valid_git_url;
