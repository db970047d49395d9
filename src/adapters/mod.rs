pub mod converter;
pub mod readme;
pub mod storage;

pub use converter::SubconverterCli;
pub use readme::ReadmeReport;
pub use storage::LocalStorage;
