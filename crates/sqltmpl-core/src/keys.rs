use sqltmpl_helpers::{fold, IndexMap};

/// Dense index into a [`KeyRegistry`]. Stable for the lifetime of a compiled
/// blueprint.
pub type KeyIndex = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bank {
    /// Bank 1: columns of the first dynamic `?SELECT`.
    Select,
    /// Bank 2: bare comment flags (`/*Name*/` with no matching variable).
    Flag,
    /// Bank 3: ordinary `@Var` variables.
    Variable,
    /// Bank 4: variables bound to a special (parameter-binding) handler.
    Special,
    /// Bank 5: variables bound to a base (text-only) handler.
    Base,
}

/// Accumulates keys bank-by-bank during compilation, then freezes into a
/// [`KeyRegistry`] with one dense, contiguous index space.
#[derive(Debug, Default)]
pub struct KeyRegistryBuilder {
    banks: [IndexMap<String, String>; 5],
}

impl KeyRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn bank_mut(&mut self, bank: Bank) -> &mut IndexMap<String, String> {
        &mut self.banks[bank as usize]
    }

    /// Registers `name` in `bank` if it is not already present in ANY bank;
    /// returns the name's eventual bank. First appearance wins: a name that
    /// already exists keeps its original bank even if asked for a new one.
    pub fn get_or_add(&mut self, bank: Bank, name: &str) -> Bank {
        if let Some(existing) = self.bank_of(name) {
            return existing;
        }
        let key = fold(name);
        self.bank_mut(bank).insert(key, name.to_string());
        bank
    }

    pub fn bank_of(&self, name: &str) -> Option<Bank> {
        let key = fold(name);
        const ORDER: [Bank; 5] = [Bank::Select, Bank::Flag, Bank::Variable, Bank::Special, Bank::Base];
        ORDER
            .into_iter()
            .find(|&bank| self.banks[bank as usize].contains_key(&key))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bank_of(name).is_some()
    }

    pub fn finish(self) -> KeyRegistry {
        let mut names = Vec::new();
        let mut index_of = IndexMap::default();
        let mut bounds = [0u32; 6];

        for (bank_idx, bank) in self.banks.into_iter().enumerate() {
            bounds[bank_idx] = names.len() as u32;
            for (folded, original) in bank {
                let idx = names.len() as u32;
                names.push(original);
                index_of.insert(folded, idx);
            }
        }
        bounds[5] = names.len() as u32;

        KeyRegistry {
            names,
            index_of,
            bounds,
        }
    }
}

/// Immutable, insertion-ordered, case-insensitive registry of all keys
/// referenced by a template. Never mutates after [`KeyRegistryBuilder::finish`].
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    names: Vec<String>,
    index_of: IndexMap<String, KeyIndex>,
    /// bounds[b]..bounds[b+1] is the index range of `Bank` variant `b`.
    bounds: [u32; 6],
}

impl KeyRegistry {
    pub fn index_of(&self, name: &str) -> Option<KeyIndex> {
        self.index_of.get(&fold(name)).copied()
    }

    pub fn name(&self, index: KeyIndex) -> &str {
        &self.names[index as usize]
    }

    pub fn count(&self) -> usize {
        self.names.len()
    }

    pub fn bank_of_index(&self, index: KeyIndex) -> Bank {
        const ORDER: [Bank; 5] = [Bank::Select, Bank::Flag, Bank::Variable, Bank::Special, Bank::Base];
        for (i, &bank) in ORDER.iter().enumerate() {
            if index >= self.bounds[i] && index < self.bounds[i + 1] {
                return bank;
            }
        }
        unreachable!("key index out of range")
    }

    /// End of bank 1 (the select-column bank), per the serialised shape.
    pub fn end_selects(&self) -> u32 {
        self.bounds[1]
    }

    /// Start of bank 3 (ordinary variables), per the serialised shape.
    pub fn start_variables(&self) -> u32 {
        self.bounds[2]
    }

    pub fn is_value_bank(&self, bank: Bank) -> bool {
        matches!(bank, Bank::Variable | Bank::Special | Bank::Base)
    }
}
