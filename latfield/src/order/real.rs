// SPDX-License-Identifier: AGPL-3.0-only

//! Closed set of storage element types.
//!
//! Register form is always f64. Storage is f64, f32, or i16 fixed point on
//! the unit interval (gauge links are bounded by 1 in magnitude once scaled,
//! so they need no per-site norm).

use bytemuck::Pod;

use crate::field::param::Precision;
use crate::lattice::constants::MAX_SHORT;

/// Element type a field can be stored in.
pub trait StorageReal: Pod + Default + Send + Sync + 'static {
    /// Precision tag of this element type.
    const PRECISION: Precision;

    /// Convert to register form.
    fn to_reg(self) -> f64;

    /// Convert from register form.
    fn from_reg(v: f64) -> Self;
}

impl StorageReal for f64 {
    const PRECISION: Precision = Precision::Double;

    #[inline]
    fn to_reg(self) -> f64 {
        self
    }

    #[inline]
    fn from_reg(v: f64) -> Self {
        v
    }
}

impl StorageReal for f32 {
    const PRECISION: Precision = Precision::Single;

    #[inline]
    fn to_reg(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn from_reg(v: f64) -> Self {
        v as f32
    }
}

impl StorageReal for i16 {
    const PRECISION: Precision = Precision::Half;

    #[inline]
    fn to_reg(self) -> f64 {
        f64::from(self) / MAX_SHORT
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    fn from_reg(v: f64) -> Self {
        (v * MAX_SHORT).round().clamp(-MAX_SHORT, MAX_SHORT) as i16
    }
}

/// Load `out.len()` elements `buf[index(i)]` into register form, times `scale`.
#[inline]
pub fn gather<T: StorageReal>(buf: &[T], scale: f64, index: impl Fn(usize) -> usize, out: &mut [f64]) {
    for (i, o) in out.iter_mut().enumerate() {
        *o = buf[index(i)].to_reg() * scale;
    }
}

/// Store `values[i] · scale` at `buf[index(i)]`.
#[inline]
pub fn scatter<T: StorageReal>(
    buf: &mut [T],
    scale: f64,
    index: impl Fn(usize) -> usize,
    values: &[f64],
) {
    for (i, &v) in values.iter().enumerate() {
        buf[index(i)] = T::from_reg(v * scale);
    }
}

/// Write `v` as element `elem` of a byte buffer of `T`s.
#[inline]
pub fn put_bytes<T: StorageReal>(dst: &mut [u8], elem: usize, v: T) {
    let sz = std::mem::size_of::<T>();
    dst[elem * sz..(elem + 1) * sz].copy_from_slice(bytemuck::bytes_of(&v));
}

/// Read element `elem` of a byte buffer of `T`s.
#[inline]
pub fn get_bytes<T: StorageReal>(src: &[u8], elem: usize) -> T {
    let sz = std::mem::size_of::<T>();
    bytemuck::pod_read_unaligned(&src[elem * sz..(elem + 1) * sz])
}
