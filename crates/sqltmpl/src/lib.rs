mod builder;
mod handlers;
mod render;

pub use builder::{Builder, Slot};
pub use handlers::{BaseHandlerFn, Handler, HandlerRegistry, SpecialHandlerFn};
pub use render::Binding;

pub use sqltmpl_core::{BuilderError, CompileError, RenderError, Value};
pub use sqltmpl_lexer::LexerConfig;
pub use sqltmpl_parser::{compile, Blueprint, Clause, ClauseKind, DynamicProjection, Segment};

/// Compiles `template` against a handler registry, returning a reusable,
/// thread-safe [`Blueprint`]. Equivalent to calling [`compile`] directly
/// with `registry` as the [`sqltmpl_core::HandlerClassifier`].
pub fn compile_template(
    template: &str,
    cfg: &LexerConfig,
    registry: &HandlerRegistry,
) -> Result<Blueprint, CompileError> {
    compile(template, cfg, registry)
}
