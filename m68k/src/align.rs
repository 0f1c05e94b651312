/// Something (usually addresses or sizes) that is alignable to a certain alignment
/// represented in the same type and usually a power of two.
pub trait Alignable {
    type Alignment;

    /// Return the smallest `x` that is a multiple of `alignment` such that `x >= num`.
    fn align_up(self, alignment: Self::Alignment) -> Self;

    /// Return the largest `x` that is a multiple of `alignment` such that `x <= num`.
    fn align_down(self, alignment: Self::Alignment) -> Self;

    /// Whether the value is already a multiple of `alignment`.
    fn is_aligned(self, alignment: Self::Alignment) -> bool;
}

macro_rules! align_up_impl {
    ($num:ident, $alignment:ident) => {
        if $alignment == 0 {
            $num
        } else {
            let mask = $alignment - 1;
            assert!($alignment & mask == 0, "alignment must be power of two");
            let padding = $alignment.wrapping_sub($num & mask);
            $num.wrapping_add(padding & mask)
        }
    };
}

macro_rules! align_down_impl {
    ($num:ident, $alignment:ident) => {
        if $alignment == 0 {
            $num
        } else {
            let mask = $alignment - 1;
            assert!($alignment & mask == 0, "alignment must be power of two");
            $num - ($num & mask)
        }
    };
}

macro_rules! alignable_impl {
    ($t:ty) => {
        impl Alignable for $t {
            type Alignment = $t;
            fn align_up(self, alignment: Self) -> Self { align_up_impl!(self, alignment) }
            fn align_down(self, alignment: Self) -> Self { align_down_impl!(self, alignment) }
            fn is_aligned(self, alignment: Self) -> bool { self.align_down(alignment) == self }
        }
    };
}

alignable_impl!(u32);
alignable_impl!(usize);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn align_down_test() {
        assert_eq!(23_u32.align_down(8), 16);
        assert_eq!(24_u32.align_down(8), 24);
        assert_eq!(0x2fff_u32.align_down(0x2000), 0x2000);

        // edge cases
        assert_eq!(23_u32.align_down(0), 23);
        assert_eq!(0xFFFF_FFFF_u32.align_down(0x2000), 0xFFFF_E000);
    }

    #[test]
    fn align_up_test() {
        assert_eq!(23_u32.align_up(8), 24);
        assert_eq!(24_u32.align_up(8), 24);
        assert_eq!(0x2001_u32.align_up(0x2000), 0x4000);

        // edge cases
        assert_eq!(23_u32.align_up(0), 23);
        assert_eq!(0_u32.align_up(0x2000), 0);
        assert!(0x4000_usize.is_aligned(0x2000));
        assert!(!0x4001_usize.is_aligned(0x2000));
    }
}
