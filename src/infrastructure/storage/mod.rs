mod http_file_store;

pub use http_file_store::HttpFileStore;
