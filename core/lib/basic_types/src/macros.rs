/// Implements `Deref`/`DerefMut` to the wrapped primitive for a newtype
/// declared as `struct Name(pub Inner);`, mirroring the teacher's
/// `zksync_basic_types` newtype boilerplate.
macro_rules! impl_deref {
    ($name:ident, $inner:ty) => {
        impl std::ops::Deref for $name {
            type Target = $inner;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

/// Implements `Display` by delegating to the wrapped value's `Display`.
macro_rules! impl_display_via_inner {
    ($name:ident) => {
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}
