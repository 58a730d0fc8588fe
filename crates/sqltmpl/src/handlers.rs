use sqltmpl_core::{HandlerClassifier, HandlerKind, RenderError, Value};

/// A base handler produces text only: `fn(name, value) -> Result<String, RenderError>`.
pub type BaseHandlerFn = fn(name: &str, value: &Value) -> Result<String, RenderError>;

/// A special handler registers parameter bindings. Returns the bindings it
/// wants recorded, in order; the renderer derives each binding's spliced
/// text from its name (with the configured prefix) rather than the handler
/// composing text itself, since the prefix is a per-compile setting the
/// handler function has no access to.
pub type SpecialHandlerFn = fn(name: &str, value: &Value) -> Result<Vec<(String, Value)>, RenderError>;

/// A letter's rule: either a [`BaseHandlerFn`] or a [`SpecialHandlerFn`].
#[derive(Clone, Copy)]
pub enum Handler {
    Base(BaseHandlerFn),
    Special(SpecialHandlerFn),
}

impl Handler {
    pub fn kind(&self) -> HandlerKind {
        match self {
            Handler::Base(_) => HandlerKind::Base,
            Handler::Special(_) => HandlerKind::Special,
        }
    }
}

/// Letter-indexed (`A`-`Z`, case-insensitive) table of value handlers.
///
/// Process-wide by convention, but nothing here enforces that; a blueprint
/// captures whatever registry it was compiled against by value, so later
/// mutations to a shared registry never retroactively affect it.
#[derive(Clone)]
pub struct HandlerRegistry {
    slots: [Option<Handler>; 26],
}

impl HandlerRegistry {
    /// An empty table with no letters bound.
    pub fn empty() -> Self {
        Self { slots: [None; 26] }
    }

    /// The reference `N`/`S`/`R`/`X` handlers from the component design.
    pub fn with_defaults() -> Self {
        let mut reg = Self::empty();
        reg.register('N', Handler::Base(handle_numeric));
        reg.register('S', Handler::Base(handle_string_literal));
        reg.register('R', Handler::Base(handle_raw));
        reg.register('X', Handler::Special(handle_expand));
        reg
    }

    pub fn register(&mut self, letter: char, handler: Handler) {
        self.slots[slot_of(letter)] = Some(handler);
    }

    pub fn get(&self, letter: char) -> Option<Handler> {
        self.slots[slot_of(letter)]
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl HandlerClassifier for HandlerRegistry {
    fn classify(&self, letter: char) -> Option<HandlerKind> {
        self.get(letter).map(|h| h.kind())
    }
}

fn slot_of(letter: char) -> usize {
    (letter.to_ascii_uppercase() as u8 - b'A') as usize
}

fn handle_numeric(name: &str, value: &Value) -> Result<String, RenderError> {
    match value {
        Value::Int(v) => Ok(v.to_string()),
        Value::Float(v) => Ok(v.to_string()),
        _ => Err(RenderError::HandlerType {
            name: name.to_string(),
            letter: 'N',
            expected: "numeric",
        }),
    }
}

fn handle_string_literal(name: &str, value: &Value) -> Result<String, RenderError> {
    match value.as_str() {
        Some(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        None => Err(RenderError::HandlerType {
            name: name.to_string(),
            letter: 'S',
            expected: "string",
        }),
    }
}

fn handle_raw(name: &str, value: &Value) -> Result<String, RenderError> {
    match value.as_str() {
        Some(s) => Ok(s.to_string()),
        None => Err(RenderError::HandlerType {
            name: name.to_string(),
            letter: 'R',
            expected: "string",
        }),
    }
}

fn handle_expand(name: &str, value: &Value) -> Result<Vec<(String, Value)>, RenderError> {
    let items = value.as_array().ok_or(RenderError::HandlerType {
        name: name.to_string(),
        letter: 'X',
        expected: "array",
    })?;
    if items.is_empty() {
        return Err(RenderError::HandlerEmpty {
            name: name.to_string(),
            letter: 'X',
        });
    }
    Ok(items
        .iter()
        .enumerate()
        .map(|(i, v)| (format!("{name}_{}", i + 1), v.clone()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_wires_up_n_s_r_x() {
        let reg = HandlerRegistry::with_defaults();
        assert!(matches!(reg.get('N'), Some(Handler::Base(_))));
        assert!(matches!(reg.get('S'), Some(Handler::Base(_))));
        assert!(matches!(reg.get('R'), Some(Handler::Base(_))));
        assert!(matches!(reg.get('X'), Some(Handler::Special(_))));
        assert!(reg.get('Z').is_none());
    }

    #[test]
    fn handler_letter_lookup_is_case_insensitive() {
        let reg = HandlerRegistry::with_defaults();
        assert!(reg.get('n').is_some());
    }

    #[test]
    fn numeric_handler_rejects_non_numeric_values() {
        let err = handle_numeric("Age", &Value::String("x".into())).unwrap_err();
        assert!(matches!(err, RenderError::HandlerType { letter: 'N', .. }));
    }

    #[test]
    fn string_handler_doubles_embedded_quotes() {
        let out = handle_string_literal("Name", &Value::String("it's".into())).unwrap();
        assert_eq!(out, "'it''s'");
    }

    #[test]
    fn expand_handler_names_each_element_by_position() {
        let out = handle_expand("Cats", &Value::Array(vec![Value::Int(10), Value::Int(20)])).unwrap();
        assert_eq!(out[0].0, "Cats_1");
        assert_eq!(out[1].0, "Cats_2");
    }

    #[test]
    fn expand_handler_fails_on_empty_collection() {
        let err = handle_expand("Cats", &Value::Array(vec![])).unwrap_err();
        assert!(matches!(err, RenderError::HandlerEmpty { letter: 'X', .. }));
    }
}
