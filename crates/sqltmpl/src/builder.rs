use sqltmpl_core::{Bank, BuilderError, KeyRegistry, Value};
use sqltmpl_parser::Blueprint;

use crate::handlers::HandlerRegistry;
use crate::render::{render, Binding};

/// One key's per-call state. Banks (1) and (2) only ever hold `None`/`Used`;
/// banks (3)-(5) additionally hold a carried [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    None,
    Used,
    Value(Value),
}

impl Slot {
    fn is_active(&self, bank: Bank, keys: &KeyRegistry) -> bool {
        if keys.is_value_bank(bank) {
            match self {
                Slot::None | Slot::Used | Slot::Value(Value::Bool(false)) => false,
                // An optional special-handler variable given an empty collection
                // is treated as absent rather than carried through to the
                // handler, which would otherwise always raise `HandlerEmpty`
                // regardless of whether the variable was optional.
                Slot::Value(Value::Array(items)) if bank == Bank::Special && items.is_empty() => false,
                Slot::Value(_) => true,
            }
        } else {
            matches!(self, Slot::Used)
        }
    }
}

/// Dense per-call state vector over a [`Blueprint`]'s key registry, plus
/// the rendering entry point. One builder is owned by a single caller for
/// the duration of one render; it holds no lock and must not be shared
/// across threads.
pub struct Builder<'a> {
    blueprint: &'a Blueprint,
    slots: Vec<Slot>,
}

impl<'a> Builder<'a> {
    pub fn new(blueprint: &'a Blueprint) -> Self {
        let slots = vec![Slot::None; blueprint.keys.count()];
        Self { blueprint, slots }
    }

    fn keys(&self) -> &KeyRegistry {
        &self.blueprint.keys
    }

    fn index_of(&self, name: &str) -> Result<usize, BuilderError> {
        self.keys()
            .index_of(name)
            .map(|i| i as usize)
            .ok_or_else(|| BuilderError::UnknownKey { name: name.to_string() })
    }

    /// Marks a bank-(1,2) key used. Errors if `name` resolves to a
    /// value-carrying (bank 3-5) slot -- those need `use_value` instead.
    pub fn use_name(&mut self, name: &str) -> Result<(), BuilderError> {
        let idx = self.index_of(name)?;
        let bank = self.keys().bank_of_index(idx as u32);
        if self.keys().is_value_bank(bank) {
            return Err(BuilderError::ValuelessUseOnVariableSlot {
                name: name.to_string(),
            });
        }
        self.slots[idx] = Slot::Used;
        Ok(())
    }

    /// Sets a bank-(3,4,5) slot to `value`. On a bank-(1,2) slot, a bool
    /// is accepted as a shorthand (`true` behaves like `use_name`, `false`
    /// is a no-op); any other value on a bank-(1,2) slot is an error.
    pub fn use_value(&mut self, name: &str, value: impl Into<Value>) -> Result<(), BuilderError> {
        let idx = self.index_of(name)?;
        let bank = self.keys().bank_of_index(idx as u32);
        let value = value.into();
        if self.keys().is_value_bank(bank) {
            self.slots[idx] = Slot::Value(value);
            return Ok(());
        }
        match value {
            Value::Bool(true) => self.slots[idx] = Slot::Used,
            Value::Bool(false) => {}
            _ => {
                return Err(BuilderError::PlainUseOnValueSlot {
                    name: name.to_string(),
                })
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<(), BuilderError> {
        let idx = self.index_of(name)?;
        self.slots[idx] = Slot::None;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.slots.fill(Slot::None);
    }

    /// Clears only bank (1) (dynamic-projection column) slots.
    pub fn reset_selects(&mut self) {
        let end = self.keys().end_selects() as usize;
        for slot in &mut self.slots[..end] {
            *slot = Slot::None;
        }
    }

    pub fn render(&self, handlers: &HandlerRegistry) -> Result<(String, Vec<Binding>), sqltmpl_core::RenderError> {
        render(self.blueprint, &self.slots, handlers)
    }
}

pub(crate) fn slot_active(keys: &KeyRegistry, index: u32, slot: &Slot) -> bool {
    slot.is_active(keys.bank_of_index(index), keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::HandlerRegistry;
    use sqltmpl_lexer::LexerConfig;

    fn blueprint(template: &str) -> Blueprint {
        sqltmpl_parser::compile(template, &LexerConfig::default(), &HandlerRegistry::with_defaults()).unwrap()
    }

    #[test]
    fn use_name_on_a_value_bank_key_is_an_error() {
        let bp = blueprint("SELECT * FROM T WHERE ID = @ID");
        let mut b = Builder::new(&bp);
        assert!(matches!(
            b.use_name("ID"),
            Err(BuilderError::ValuelessUseOnVariableSlot { .. })
        ));
    }

    #[test]
    fn use_value_on_a_flag_bank_key_accepts_bool_only() {
        let bp = blueprint("SELECT * FROM T /*Flag*/WHERE 1=1");
        let mut b = Builder::new(&bp);
        assert!(matches!(
            b.use_value("Flag", 5i64),
            Err(BuilderError::PlainUseOnValueSlot { .. })
        ));
        b.use_value("Flag", true).unwrap();
        b.use_value("Flag", false).unwrap();
    }

    #[test]
    fn unknown_key_is_reported() {
        let bp = blueprint("SELECT * FROM T");
        let mut b = Builder::new(&bp);
        assert!(matches!(b.use_name("Nope"), Err(BuilderError::UnknownKey { .. })));
    }

    #[test]
    fn remove_reverts_a_value_to_unset() {
        let bp = blueprint("SELECT * FROM T WHERE ID = ?@ID");
        let mut b = Builder::new(&bp);
        b.use_value("ID", 1i64).unwrap();
        b.remove("ID").unwrap();
        let (sql, _) = b.render(&HandlerRegistry::with_defaults()).unwrap();
        assert_eq!(sql, "SELECT * FROM T");
    }

    #[test]
    fn optional_special_handler_empty_array_is_inactive() {
        let bp = blueprint("SELECT * FROM T WHERE ID IN (?@ID_X)");
        let mut b = Builder::new(&bp);
        b.use_value("ID", Vec::<i64>::new()).unwrap();
        let (sql, _) = b.render(&HandlerRegistry::with_defaults()).unwrap();
        assert_eq!(sql, "SELECT * FROM T");
    }

    #[test]
    fn reset_clears_every_slot() {
        let bp = blueprint("SELECT * FROM T WHERE ID = ?@ID");
        let mut b = Builder::new(&bp);
        b.use_value("ID", 1i64).unwrap();
        b.reset();
        let (sql, _) = b.render(&HandlerRegistry::with_defaults()).unwrap();
        assert_eq!(sql, "SELECT * FROM T");
    }
}
