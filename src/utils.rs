//! # Utility Functions Module
//!
//! Small helpers that keep engine command lines readable.

/// Builds an argument vector from items of mixed `Display` types.
///
/// # Example
/// ```rust
/// use pdf_compressor_service::args;
///
/// let quality = 60;
/// let args = args!["-dJPEGQ", quality, format!("-r{}", 72)];
/// assert_eq!(args, vec!["-dJPEGQ", "60", "-r72"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        ::std::vec![$(::std::string::ToString::to_string(&$item)),*]
    };
}
