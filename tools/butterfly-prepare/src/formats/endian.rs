//! Byte order handling
//!
//! Graph files are written in the byte order of the machine that built them.
//! A reader recognizes a foreign file by its byte-swapped fingerprint magic and
//! swaps every scalar it decodes. The same machinery lets tests and
//! cross-building hosts emit files for the other byte order.

/// Byte order of a file relative to this machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Native,
    Swapped,
}

impl ByteOrder {
    /// Convert a scalar between this order and native order (the operation is
    /// its own inverse)
    #[inline]
    pub fn apply<T: ByteSwap>(self, value: T) -> T {
        match self {
            ByteOrder::Native => value,
            ByteOrder::Swapped => value.byte_swap(),
        }
    }
}

/// Scalars that can be byte-swapped
pub trait ByteSwap: Copy {
    fn byte_swap(self) -> Self;
}

macro_rules! impl_byte_swap {
    ($($t:ty),*) => {
        $(
            impl ByteSwap for $t {
                #[inline]
                fn byte_swap(self) -> Self {
                    self.swap_bytes()
                }
            }
        )*
    };
}

impl_byte_swap!(u8, u16, i16, u32, i32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_is_involution() {
        let v: u32 = 0x1122_3344;
        assert_eq!(ByteOrder::Swapped.apply(v), 0x4433_2211);
        assert_eq!(ByteOrder::Swapped.apply(ByteOrder::Swapped.apply(v)), v);
        assert_eq!(ByteOrder::Native.apply(v), v);
        assert_eq!(ByteOrder::Swapped.apply(0x0102i16), 0x0201);
        assert_eq!(ByteOrder::Swapped.apply(7u8), 7);
    }
}
