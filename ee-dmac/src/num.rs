macro_rules! impl_ext_trait {
    ($name:ident, $t:ty $(, $qword_aligned:ident)?) => {
        pub trait $name {
            fn bit(self, i: u8) -> bool;

            $(
                /// Clears the low 4 bits, aligning a byte address to a quadword boundary.
                fn $qword_aligned(self) -> Self;
            )?
        }

        impl $name for $t {
            #[inline(always)]
            fn bit(self, i: u8) -> bool {
                self & (1 << i) != 0
            }

            $(
                #[inline(always)]
                fn $qword_aligned(self) -> Self {
                    self & !0xF
                }
            )?
        }
    };
}

impl_ext_trait!(U16Ext, u16);
impl_ext_trait!(U32Ext, u32, qword_aligned);
