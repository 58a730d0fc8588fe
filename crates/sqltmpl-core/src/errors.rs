use thiserror::Error;

/// Errors raised while turning template text into a [`crate::Blueprint`].
///
/// Fatal to the blueprint under construction; they never leave a partially
/// built blueprint behind.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CompileError {
    #[error("template syntax error at offset {offset}: {message}")]
    TemplateSyntax { offset: usize, message: String },

    #[error("variable {name} uses unknown handler letter '{letter}'")]
    UnknownHandlerLetter { name: String, letter: char },

    #[error("marker references unknown variable '{name}'")]
    UnknownVariableInMarker { name: String },
}

/// Errors raised while rendering a compiled blueprint against a builder's
/// state. The blueprint and the builder both remain reusable afterwards.
#[derive(Debug, Error, PartialEq, Clone)]
pub enum RenderError {
    #[error("dynamic projection produced zero active columns")]
    EmptyProjection,

    #[error("handler '{letter}' has no value for required variable '{name}'")]
    HandlerMissingValue { name: String, letter: char },

    #[error("handler '{letter}' rejected the value of '{name}': expected {expected}")]
    HandlerType {
        name: String,
        letter: char,
        expected: &'static str,
    },

    #[error("handler '{letter}' received an empty collection for required variable '{name}'")]
    HandlerEmpty { name: String, letter: char },
}

/// Errors raised by the [`crate::Builder`] state-vector API.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum BuilderError {
    #[error("'{name}' is a bank-1/2 slot; use `use(name)` without a value")]
    PlainUseOnValueSlot { name: String },

    #[error("'{name}' is a variable slot; call `use(name, value)` instead")]
    ValuelessUseOnVariableSlot { name: String },

    #[error("unknown key '{name}'")]
    UnknownKey { name: String },
}
