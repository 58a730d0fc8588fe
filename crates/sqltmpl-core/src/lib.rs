pub mod errors;
pub mod handler;
pub mod keys;
pub mod tokens;
pub mod value;

pub use errors::{BuilderError, CompileError, RenderError};
pub use handler::{HandlerClassifier, HandlerKind};
pub use keys::{Bank, KeyIndex, KeyRegistry, KeyRegistryBuilder};
pub use tokens::{LogicalOp, Span, Token, TokenKind};
pub use value::Value;
