use std::hash::BuildHasherDefault;

pub type IndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasherDefault<ahash::AHasher>>;
pub type IndexSet<V> = indexmap::IndexSet<V, BuildHasherDefault<ahash::AHasher>>;

/// Builder-style in-place configuration, mirrored on every type that wants it.
pub trait Config: Sized {
    fn config(mut self, f: impl FnOnce(&mut Self)) -> Self {
        f(&mut self);
        self
    }
}

impl<T> Config for T {}

/// ASCII case-fold used everywhere a key or keyword is compared.
pub fn fold(s: &str) -> String {
    s.to_ascii_lowercase()
}
