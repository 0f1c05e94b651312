//! Newtype wrappers that make it harder to accidentally confuse physical and virtual addresses.
//!
//! Before translation is enabled both kinds of address are numerically identical, the
//! distinction only starts to matter once a relocation base is applied to physical ones.

use core::fmt;
use core::ops;

use super::align::Alignable;

/// A virtual address. It's validity depends on the current page mapping.
#[repr(C)]
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug, Default)]
pub struct VirtAddr(pub u32);

/// A physical address. Whether it is accessible depends on the current page mapping.
#[repr(C)]
#[derive(Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Debug, Default)]
pub struct PhysAddr(pub u32);

impl VirtAddr {
    pub unsafe fn as_ptr<T>(self) -> *const T {
        self.0 as usize as *const T
    }

    pub unsafe fn as_mut_ptr<T>(self) -> *mut T {
        self.0 as usize as *mut T
    }

    /// The physical address this virtual address refers to while PA == VA.
    pub const fn identity(self) -> PhysAddr {
        PhysAddr(self.0)
    }
}

impl PhysAddr {
    /// The virtual address of this physical address while PA == VA.
    pub const fn identity(self) -> VirtAddr {
        VirtAddr(self.0)
    }
}

macro_rules! impl_addr_arith {
    ($addr:tt) => {
        impl Alignable for $addr {
            type Alignment = u32;

            fn align_up(self, alignment: u32) -> Self {
                $addr(self.0.align_up(alignment))
            }

            fn align_down(self, alignment: u32) -> Self {
                $addr(self.0.align_down(alignment))
            }

            fn is_aligned(self, alignment: u32) -> bool {
                self.0.is_aligned(alignment)
            }
        }

        impl ops::Add<u32> for $addr {
            type Output = $addr;

            fn add(self, other: u32) -> Self::Output {
                $addr(self.0 + other)
            }
        }

        impl ops::AddAssign<u32> for $addr {
            fn add_assign(&mut self, other: u32) {
                self.0 += other;
            }
        }

        impl ops::Sub<u32> for $addr {
            type Output = $addr;

            fn sub(self, other: u32) -> Self::Output {
                $addr(self.0 - other)
            }
        }

        /// Distance in bytes between two addresses.
        impl ops::Sub<$addr> for $addr {
            type Output = u32;

            fn sub(self, other: $addr) -> u32 {
                self.0 - other.0
            }
        }
    };
}

impl_addr_arith!(VirtAddr);
impl_addr_arith!(PhysAddr);

impl fmt::Pointer for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PHYS_0x{:08x}", self.0)
    }
}

impl fmt::Pointer for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "VIRT_0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn address_arithmetic() {
        let a = PhysAddr(0x0001_2345);
        assert_eq!(a.align_down(0x2000), PhysAddr(0x0001_2000));
        assert_eq!(a.align_up(0x2000), PhysAddr(0x0001_4000));
        assert_eq!((a + 0x10) - a, 0x10);
        assert_eq!(a.identity().identity(), a);
        assert_eq!(format!("{:p}", VirtAddr(0xff00_0000)), "VIRT_0xff000000");
    }
}
